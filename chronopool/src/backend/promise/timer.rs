//! Expiry scan for outstanding promises (spec §4.6: "a single timer per
//! server... scans for expired pids and resolves them with
//! `TimeoutError`").

use std::time::Instant;

use super::promise::{Promise, PromiseStatus};

/// Resolve `promise` with `TimeoutError` if it's still pending and past
/// its deadline. Returns whether it was touched. This is the primitive
/// `pending::PendingPromises::sweep_expired` runs per entry; `sweep_expired`
/// below is the batch form kept for callers holding a plain slice.
pub fn resolve_if_expired(promise: &mut Promise, now: Instant) -> bool {
    if promise.is_expired(now) {
        promise.resolve(PromiseStatus::TimeoutError, None);
        true
    } else {
        false
    }
}

/// Resolve `promise` with `CancelledError` if still pending (spec §4.6:
/// "on connection drop all pending promises for that server are resolved
/// with `CancelledError`"). Returns whether it was touched.
pub fn cancel_if_pending(promise: &mut Promise) -> bool {
    if promise.is_pending() {
        promise.resolve(PromiseStatus::CancelledError, None);
        true
    } else {
        false
    }
}

/// Resolve every expired, still-pending promise in `promises` with
/// `TimeoutError`, returning the indices that were touched so the caller
/// can notify the owning `PromiseSet`s.
pub fn sweep_expired(promises: &mut [Promise], now: Instant) -> Vec<usize> {
    promises
        .iter_mut()
        .enumerate()
        .filter(|(_, promise)| resolve_if_expired(promise, now))
        .map(|(index, _)| index)
        .collect()
}

/// Resolve every still-pending promise in `promises` with
/// `CancelledError`, returning the indices that were touched.
pub fn cancel_all(promises: &mut [Promise]) -> Vec<usize> {
    promises
        .iter_mut()
        .enumerate()
        .filter(|(_, promise)| cancel_if_pending(promise))
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::server::Server;
    use std::time::Duration;
    use uuid::Uuid;

    fn server() -> Server {
        Server::new(Uuid::new_v4(), "s", 0)
    }

    #[test]
    fn sweep_only_touches_expired_pending_promises() {
        let mut promises = vec![
            Promise::new(server(), Duration::from_secs(0), vec![]),
            Promise::new(server(), Duration::from_secs(60), vec![]),
        ];
        let touched = sweep_expired(&mut promises, Instant::now());
        assert_eq!(touched, vec![0]);
        assert_eq!(promises[0].status(), PromiseStatus::TimeoutError);
        assert!(promises[1].is_pending());
    }

    #[test]
    fn cancel_all_resolves_every_pending_promise() {
        let mut promises = vec![
            Promise::new(server(), Duration::from_secs(60), vec![]),
            Promise::new(server(), Duration::from_secs(60), vec![]),
        ];
        let touched = cancel_all(&mut promises);
        assert_eq!(touched.len(), 2);
        assert!(promises
            .iter()
            .all(|p| p.status() == PromiseStatus::CancelledError));
    }

    #[test]
    fn cancel_all_leaves_already_resolved_promises_alone() {
        let mut promises = vec![Promise::new(server(), Duration::from_secs(60), vec![])];
        promises[0].resolve(PromiseStatus::Success, None);
        let touched = cancel_all(&mut promises);
        assert!(touched.is_empty());
        assert_eq!(promises[0].status(), PromiseStatus::Success);
    }
}
