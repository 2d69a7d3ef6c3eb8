//! Cluster/pool construction errors (spec §4.2).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cluster topology has no pools configured")]
    NoPools,

    #[error("local server uuid is not present in the cluster topology")]
    LocalServerMissing,

    #[error(transparent)]
    Replication(#[from] crate::backend::replication::Error),
}
