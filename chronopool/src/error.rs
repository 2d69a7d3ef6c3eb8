//! Top-level error, composed from each subsystem's own error (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(#[from] chronopool_config::Error),

    #[error("{0}")]
    Net(#[from] crate::net::Error),

    #[error("{0}")]
    Backend(#[from] crate::backend::Error),

    #[error("{0}")]
    Frontend(#[from] crate::frontend::Error),
}
