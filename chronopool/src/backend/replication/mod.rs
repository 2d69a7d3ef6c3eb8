//! FIFO-backed replica synchronization (spec §4.5).

pub mod error;
pub mod fifo;
pub mod init_file;
pub mod replicator;

pub use error::Error;
pub use fifo::Fifo;
pub use init_file::InitFile;
pub use replicator::{Replicator, ReplicatorAction};
