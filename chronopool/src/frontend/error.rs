//! User-visible query errors (spec §7 `QueryError` kind). Handlers
//! populate `query.err_msg` from one of these and the dispatch stops
//! walking further nodes — the taxonomy's other kinds (`WriteError`,
//! `TimeoutError`, `CancelledError`, `ProtocolError`) live on the
//! backend side (`backend::promise::PromiseStatus`,
//! `backend::replication::Error`) since they are never shown to a
//! client.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("access denied: statement requires {0}")]
    AccessDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("limit must be greater than 0")]
    NonPositiveLimit,

    #[error("where expression nesting exceeds the configured limit of {0}")]
    WhereDepthExceeded(u32),

    #[error("malformed query: {0}")]
    Malformed(String),

    #[error("unknown property \"{0}\"")]
    UnknownProperty(String),

    #[error(transparent)]
    Access(#[from] chronopool_config::Error),
}
