use serde::{Deserialize, Serialize};

/// Snapshot of a single `Replicator`'s state, for `SHOW REPLICATION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicatorStats {
    pub state: ReplicatorState,
    pub ticks: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicatorState {
    #[default]
    Idle,
    Running,
    Stopping,
    Paused,
    Closed,
}

impl Default for ReplicatorStats {
    fn default() -> Self {
        Self {
            state: ReplicatorState::Idle,
            ticks: 0,
        }
    }
}
