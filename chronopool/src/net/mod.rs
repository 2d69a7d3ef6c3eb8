//! Wire protocol (spec §6): length-prefixed packet framing plus the
//! self-describing typed packer stream carried in packet bodies. The TCP
//! socket layer itself is a named external interface (spec §1) — this
//! module only encodes/decodes bytes.

pub mod error;
pub mod packer;
pub mod packet;

pub use error::Error;
pub use packer::{Packer, Unpacker, Value};
pub use packet::{Packet, PacketType};
