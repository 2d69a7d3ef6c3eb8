use std::ops::Sub;

use serde::{Deserialize, Serialize};

/// FIFO replication queue counters (spec §3 FIFO, §8 invariant 4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoStats {
    pub pushed: usize,
    pub committed: usize,
    pub committed_err: usize,
    /// Records currently between the read and write cursor.
    pub pending: usize,
}

impl Sub for FifoStats {
    type Output = FifoStats;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            pushed: self.pushed.saturating_sub(rhs.pushed),
            committed: self.committed.saturating_sub(rhs.committed),
            committed_err: self.committed_err.saturating_sub(rhs.committed_err),
            pending: self.pending,
        }
    }
}
