use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on \"{0}\": {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("TOML parse error in \"{0}\": {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("access string \"{0}\" contains an unknown permission")]
    UnknownAccess(String),

    #[error("pool id {0} has no servers")]
    EmptyPool(u16),
}
