use std::ops::Sub;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Query dispatch counters (spec §4.3, §4.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub received: usize,
    pub completed: usize,
    pub errors: usize,
    /// Statements that forwarded a sub-query to peer pools.
    pub forwarded: usize,
    pub query_time: Duration,
}

impl Sub for QueryStats {
    type Output = QueryStats;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            received: self.received.saturating_sub(rhs.received),
            completed: self.completed.saturating_sub(rhs.completed),
            errors: self.errors.saturating_sub(rhs.errors),
            forwarded: self.forwarded.saturating_sub(rhs.forwarded),
            query_time: self.query_time.saturating_sub(rhs.query_time),
        }
    }
}
