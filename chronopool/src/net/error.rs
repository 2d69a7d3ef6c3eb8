//! Wire protocol decode errors. Grounded on `pgdog::net::Error`'s shape:
//! one flat enum covering framing and the typed-tag packer stream.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of buffer while decoding {0}")]
    Eof(&'static str),

    #[error("unknown packer tag byte {0:#04x}")]
    UnknownTag(u8),

    #[error("unknown packet type byte {0:#04x}")]
    UnknownPacketType(u8),

    #[error("packet checksum mismatch: expected {expected:#04x}, got {got:#04x}")]
    ChecksumMismatch { expected: u8, got: u8 },

    #[error("string body is not valid utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("expected a map key (string), found a different tag")]
    ExpectedMapKey,
}
