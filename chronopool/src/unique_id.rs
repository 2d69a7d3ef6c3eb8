//! Monotonically increasing ids, used to stamp outbound promises (spec
//! §4.6: "a promise is created with a monotonically increasing id (pid),
//! stamped on the outbound packet"). Grounded on
//! `pgdog::net::messages::BackendKeyData`'s counter.

use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Next process-wide unique id. Wraps around after `u64::MAX`, which is
/// not reachable in practice.
pub fn next() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let a = next();
        let b = next();
        assert!(b > a);
    }
}
