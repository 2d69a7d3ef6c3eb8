//! The self-describing typed byte stream used for query response bodies
//! (spec §6): `INT8..INT64`, `DOUBLE`, `RAW(len)`, `STRING(len)`,
//! `ARRAY_OPEN/CLOSE`, `MAP_OPEN/CLOSE`, and the fixed-arity `MAPn` /
//! `ARRAYn` variants.
//!
//! `Packer` is the writer half; `Unpacker` parses a byte slice back into
//! a `Value` tree. The result-merge handlers in `frontend::merge` read
//! peer responses with `Unpacker` and splice their bytes opaquely into
//! the local `Packer` (spec §2: "Result Packer... opaquely extended from
//! peer responses").

use bytes::{Buf, BufMut, Bytes, BytesMut};
use indexmap::IndexMap;

use super::error::Error;

const TAG_INT8: u8 = 0x01;
const TAG_INT16: u8 = 0x02;
const TAG_INT32: u8 = 0x03;
const TAG_INT64: u8 = 0x04;
const TAG_DOUBLE: u8 = 0x05;
const TAG_RAW: u8 = 0x06;
const TAG_STRING: u8 = 0x07;
const TAG_ARRAY_OPEN: u8 = 0x08;
const TAG_ARRAY_CLOSE: u8 = 0x09;
const TAG_MAP_OPEN: u8 = 0x0a;
const TAG_MAP_CLOSE: u8 = 0x0b;
const TAG_MAPN: u8 = 0x0c;
const TAG_ARRAYN: u8 = 0x0d;

/// A parsed packer value. Maps preserve insertion order, the same
/// guarantee `MAP_OPEN`/`MAPn` give on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Raw(Vec<u8>),
    Str(String),
    Array(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Byte-oriented writer producing a packer-tagged stream.
#[derive(Debug, Default, Clone)]
pub struct Packer {
    buf: BytesMut,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn map_open(&mut self) -> &mut Self {
        self.buf.put_u8(TAG_MAP_OPEN);
        self
    }

    pub fn map_close(&mut self) -> &mut Self {
        self.buf.put_u8(TAG_MAP_CLOSE);
        self
    }

    pub fn array_open(&mut self) -> &mut Self {
        self.buf.put_u8(TAG_ARRAY_OPEN);
        self
    }

    pub fn array_close(&mut self) -> &mut Self {
        self.buf.put_u8(TAG_ARRAY_CLOSE);
        self
    }

    /// A map with a known arity: `n` key/value pairs follow directly,
    /// with no terminating `MAP_CLOSE`.
    pub fn mapn(&mut self, n: u16) -> &mut Self {
        self.buf.put_u8(TAG_MAPN);
        self.buf.put_u16(n);
        self
    }

    /// An array with a known arity: `n` values follow directly, with no
    /// terminating `ARRAY_CLOSE`.
    pub fn arrayn(&mut self, n: u16) -> &mut Self {
        self.buf.put_u8(TAG_ARRAYN);
        self.buf.put_u16(n);
        self
    }

    /// Smallest `INTn` tag that fits `v` — mirrors spec §6's
    /// `INT8..INT64` family rather than always emitting a fixed width.
    pub fn push_int(&mut self, v: i64) -> &mut Self {
        if let Ok(v8) = i8::try_from(v) {
            self.buf.put_u8(TAG_INT8);
            self.buf.put_i8(v8);
        } else if let Ok(v16) = i16::try_from(v) {
            self.buf.put_u8(TAG_INT16);
            self.buf.put_i16(v16);
        } else if let Ok(v32) = i32::try_from(v) {
            self.buf.put_u8(TAG_INT32);
            self.buf.put_i32(v32);
        } else {
            self.buf.put_u8(TAG_INT64);
            self.buf.put_i64(v);
        }
        self
    }

    pub fn push_double(&mut self, v: f64) -> &mut Self {
        self.buf.put_u8(TAG_DOUBLE);
        self.buf.put_f64(v);
        self
    }

    pub fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_u8(TAG_RAW);
        self.buf.put_u32(bytes.len() as u32);
        self.buf.put_slice(bytes);
        self
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.buf.put_u8(TAG_STRING);
        self.buf.put_u32(s.len() as u32);
        self.buf.put_slice(s.as_bytes());
        self
    }

    /// Re-serialize a previously parsed value, e.g. a peer's `__timeit__`
    /// sub-object extracted during merge (spec §4.4).
    pub fn push_value(&mut self, value: &Value) -> &mut Self {
        match value {
            Value::Int(v) => {
                self.push_int(*v);
            }
            Value::Double(v) => {
                self.push_double(*v);
            }
            Value::Raw(bytes) => {
                self.push_raw(bytes);
            }
            Value::Str(s) => {
                self.push_str(s);
            }
            Value::Array(items) => {
                self.arrayn(items.len() as u16);
                for item in items {
                    self.push_value(item);
                }
            }
            Value::Map(map) => {
                self.mapn(map.len() as u16);
                for (k, v) in map {
                    self.push_str(k);
                    self.push_value(v);
                }
            }
        }
        self
    }

    /// Splice a peer's raw response bytes directly in, unparsed — used
    /// when the local packer is extended opaquely rather than
    /// re-serialized value by value.
    pub fn extend_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Reader over a packer-tagged byte stream.
pub struct Unpacker<'a> {
    buf: &'a [u8],
}

impl<'a> Unpacker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take_u8(&mut self) -> Result<u8, Error> {
        if self.buf.is_empty() {
            return Err(Error::Eof("tag"));
        }
        let b = self.buf[0];
        self.buf.advance(1);
        Ok(b)
    }

    fn take_n(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], Error> {
        if self.buf.len() < n {
            return Err(Error::Eof(what));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Parse one complete value (recursively, for arrays/maps) from the
    /// front of the stream.
    pub fn parse_value(&mut self) -> Result<Value, Error> {
        let tag = self.take_u8()?;
        self.parse_tagged(tag)
    }

    fn parse_tagged(&mut self, tag: u8) -> Result<Value, Error> {
        match tag {
            TAG_INT8 => Ok(Value::Int(self.take_n(1, "int8")?[0] as i8 as i64)),
            TAG_INT16 => {
                let b = self.take_n(2, "int16")?;
                Ok(Value::Int(i16::from_be_bytes([b[0], b[1]]) as i64))
            }
            TAG_INT32 => {
                let b = self.take_n(4, "int32")?;
                Ok(Value::Int(i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as i64))
            }
            TAG_INT64 => {
                let b = self.take_n(8, "int64")?;
                Ok(Value::Int(i64::from_be_bytes(b.try_into().unwrap())))
            }
            TAG_DOUBLE => {
                let b = self.take_n(8, "double")?;
                Ok(Value::Double(f64::from_be_bytes(b.try_into().unwrap())))
            }
            TAG_RAW => {
                let len = self.take_len()?;
                Ok(Value::Raw(self.take_n(len, "raw body")?.to_vec()))
            }
            TAG_STRING => {
                let len = self.take_len()?;
                let bytes = self.take_n(len, "string body")?;
                Ok(Value::Str(String::from_utf8(bytes.to_vec())?))
            }
            TAG_ARRAY_OPEN => {
                let mut items = Vec::new();
                loop {
                    let next = self.take_u8()?;
                    if next == TAG_ARRAY_CLOSE {
                        break;
                    }
                    items.push(self.parse_tagged(next)?);
                }
                Ok(Value::Array(items))
            }
            TAG_MAP_OPEN => {
                let mut map = IndexMap::new();
                loop {
                    let next = self.take_u8()?;
                    if next == TAG_MAP_CLOSE {
                        break;
                    }
                    let key = match self.parse_tagged(next)? {
                        Value::Str(s) => s,
                        _ => return Err(Error::ExpectedMapKey),
                    };
                    let value = self.parse_value()?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            TAG_MAPN => {
                let n = self.take_len16()?;
                let mut map = IndexMap::with_capacity(n);
                for _ in 0..n {
                    let key = match self.parse_value()? {
                        Value::Str(s) => s,
                        _ => return Err(Error::ExpectedMapKey),
                    };
                    let value = self.parse_value()?;
                    map.insert(key, value);
                }
                Ok(Value::Map(map))
            }
            TAG_ARRAYN => {
                let n = self.take_len16()?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.parse_value()?);
                }
                Ok(Value::Array(items))
            }
            other => Err(Error::UnknownTag(other)),
        }
    }

    fn take_len(&mut self) -> Result<usize, Error> {
        let b = self.take_n(4, "length prefix")?;
        Ok(u32::from_be_bytes(b.try_into().unwrap()) as usize)
    }

    fn take_len16(&mut self) -> Result<usize, Error> {
        let b = self.take_n(2, "arity prefix")?;
        Ok(u16::from_be_bytes([b[0], b[1]]) as usize)
    }
}
