//! Read-only (or cheaply-locked) local state handlers query against.
//! Kept decoupled from `backend`'s actual types so the dispatch layer
//! can be unit tested without constructing a full `Pools`/`Server` —
//! `state::Runtime` projects a fresh `LocalData` snapshot for each
//! incoming query.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::access::UserHandle;
use crate::backend::server::Server;

/// A single series, as far as the coordination layer is concerned — the
/// on-disk shard holding its points is out of scope (spec §1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRecord {
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
pub struct PoolSummary {
    pub id: u16,
    pub online: bool,
    pub available: bool,
}

/// Guarded by `series_mutex` in spirit (spec §5): held for the duration
/// of a statement's tree walk by `list series`, `select`, `drop series`
/// and `drop shard`.
pub type SeriesIndex = Arc<Mutex<Vec<SeriesRecord>>>;

/// A snapshot of cluster state a single statement walk executes
/// against. `servers` carries the real `backend::Server` handles
/// (rather than a decoupled summary) so `alter server <ref>` can pin
/// one in `AlterState::subject_server` the same way `alter user` pins a
/// `UserHandle` (spec §8 invariant 6).
pub struct LocalData {
    pub local_pool_id: u16,
    pub local_server_name: String,
    pub pools: Vec<PoolSummary>,
    pub servers: Vec<Server>,
    pub users: Vec<UserHandle>,
    pub series: SeriesIndex,
    pub where_depth_limit: u32,
    pub default_limit: u32,
    pub started_at: Instant,
}

impl LocalData {
    pub fn find_user(&self, name: &str) -> Option<UserHandle> {
        self.users.iter().find(|u| u.name == name).cloned()
    }

    pub fn find_server(&self, name_or_uuid: &str) -> Option<&Server> {
        self.servers
            .iter()
            .find(|s| s.name() == name_or_uuid || s.uuid().to_string() == name_or_uuid)
    }
}
