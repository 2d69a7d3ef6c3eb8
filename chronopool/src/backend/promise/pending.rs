//! Maps an outstanding promise's pid back to the `PromiseSet` slot that
//! is waiting on it (spec §4.6: "responses are matched by pid"), so a
//! `Transport`'s response callback and the periodic timeout sweep can
//! both resolve the right slot without knowing anything about each
//! other, or about `send_pkg`'s caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::promise::PromiseStatus;
use super::promise_set::PromiseSet;
use super::timer;

struct PendingEntry {
    set: Arc<Mutex<PromiseSet>>,
    index: usize,
}

/// Cheaply `Clone`-able handle onto the shared registry; `Pools` owns one
/// copy, and each outstanding promise's response closure owns another.
#[derive(Clone, Default)]
pub struct PendingPromises {
    entries: Arc<Mutex<HashMap<u64, PendingEntry>>>,
}

impl PendingPromises {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register slot `index` of `set` as awaiting `pid`'s response.
    pub fn register(&self, pid: u64, set: Arc<Mutex<PromiseSet>>, index: usize) {
        self.entries.lock().insert(pid, PendingEntry { set, index });
    }

    /// A response arrived for `pid`. No-op if nothing is waiting for it
    /// (already timed out, or the pid is stale) — a promise settles
    /// exactly once, and `Promise::resolve` itself is the second line of
    /// defense if this ever raced.
    pub fn resolve(&self, pid: u64, status: PromiseStatus, data: Option<Vec<u8>>) {
        let Some(entry) = self.entries.lock().remove(&pid) else {
            return;
        };
        entry.set.lock().resolve_slot(entry.index, status, data);
    }

    /// Resolve every promise past its deadline with `TimeoutError` (spec
    /// §4.6: "a single timer... scans for expired pids"). Meant to run
    /// alongside the replicator tick on the same clock.
    pub fn sweep_expired(&self, now: Instant) {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| {
            let mut set = entry.set.lock();
            let Some(promise) = set.slot_mut(entry.index) else {
                return false;
            };
            if timer::resolve_if_expired(promise, now) {
                set.resolve(entry.index);
                false
            } else {
                true
            }
        });
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
