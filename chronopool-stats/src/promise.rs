use std::ops::Sub;

use serde::{Deserialize, Serialize};

/// Promise / PromiseSet counters (spec §4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseStats {
    pub sent: usize,
    pub success: usize,
    pub write_error: usize,
    pub timeout_error: usize,
    pub cancelled_error: usize,
    pub type_error: usize,
    /// Sets that settled with at least one `None` slot (no server
    /// available in some pool, spec §6 scenario S6).
    pub partial_sets: usize,
}

impl Sub for PromiseStats {
    type Output = PromiseStats;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            sent: self.sent.saturating_sub(rhs.sent),
            success: self.success.saturating_sub(rhs.success),
            write_error: self.write_error.saturating_sub(rhs.write_error),
            timeout_error: self.timeout_error.saturating_sub(rhs.timeout_error),
            cancelled_error: self.cancelled_error.saturating_sub(rhs.cancelled_error),
            type_error: self.type_error.saturating_sub(rhs.type_error),
            partial_sets: self.partial_sets.saturating_sub(rhs.partial_sets),
        }
    }
}
