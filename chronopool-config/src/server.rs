use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One server entry from the cluster topology file.
///
/// The pool set (spec §4.2) is built from the full list of these: the
/// number of pools is `max(pool) + 1`, and each server is appended to its
/// pool's member list in file order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Stable server identity, persisted across restarts.
    pub uuid: Uuid,
    /// Human-readable name, used in log lines and `SHOW SERVERS`.
    pub name: String,
    /// Pool this server belongs to.
    pub pool: u16,
    pub host: String,
    pub port: u16,
    /// True for the server record that represents this process.
    #[serde(default)]
    pub is_local: bool,
}
