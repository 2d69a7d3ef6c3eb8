//! Replication subsystem errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error on \"{0}\": {1}")]
    Io(PathBuf, #[source] io::Error),

    #[error("corrupt fifo record at \"{0}\" offset {1}")]
    CorruptRecord(PathBuf, u64),
}
