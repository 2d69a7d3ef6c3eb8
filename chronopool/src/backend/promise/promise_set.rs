//! Aggregates N promises behind one joint callback (spec §4.6).

use serde_json::Value;

use super::promise::{Promise, PromiseStatus};

/// Invoked exactly once, when every slot has settled (spec §8 invariant
/// 5). Receives the settled slots (a `None` entry means "no server was
/// available for that pool") plus the opaque user data passed to
/// `send_pkg`.
pub type PromiseCallback = Box<dyn FnOnce(Vec<Option<Promise>>, Value) + Send>;

/// A fixed-size collection of promises gathered from a single fan-out
/// (spec §3: `PromiseSet`). `pending` counts unsettled slots; the
/// callback fires the instant it reaches zero, and is then consumed —
/// a second attempt to fire is an internal logic error, not a recoverable
/// one, so it is simply ignored rather than surfaced.
pub struct PromiseSet {
    pending: usize,
    slots: Vec<Option<Promise>>,
    cb: Option<PromiseCallback>,
    user_data: Value,
}

impl PromiseSet {
    pub fn new(size: usize, cb: PromiseCallback, user_data: Value) -> Self {
        let mut slots = Vec::with_capacity(size);
        slots.resize_with(size, || None);
        let mut set = Self {
            pending: size,
            slots,
            cb: Some(cb),
            user_data,
        };
        if size == 0 {
            set.fire();
        }
        set
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Fill slot `index`. A `None` promise (no server was available)
    /// settles the slot immediately, same as an already-resolved one
    /// (spec §4.2: "a null entry means never sent"). A still-pending
    /// promise is settled later via `resolve`.
    pub fn fill(&mut self, index: usize, promise: Option<Promise>) {
        let settles_now = promise.as_ref().is_none_or(|p| !p.is_pending());
        self.slots[index] = promise;
        if settles_now {
            self.settle_one();
        }
    }

    /// Called once the promise in slot `index` has resolved (by response
    /// or timeout), firing the callback if this was the last pending slot.
    pub fn resolve(&mut self, index: usize) {
        if self.slots[index].as_ref().is_some_and(|p| !p.is_pending()) {
            self.settle_one();
        }
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Promise> {
        self.slots[index].as_mut()
    }

    /// Resolve the promise in slot `index` with `status`/`data`, then run
    /// the usual settle bookkeeping (spec §4.6: a response arriving and a
    /// timeout firing both funnel through this). A no-op if the slot was
    /// never filled (can't happen once a pid was handed out for it) or
    /// already settled.
    pub fn resolve_slot(&mut self, index: usize, status: PromiseStatus, data: Option<Vec<u8>>) {
        if let Some(promise) = self.slots[index].as_mut() {
            promise.resolve(status, data);
        }
        self.resolve(index);
    }

    fn settle_one(&mut self) {
        if self.pending == 0 {
            return;
        }
        self.pending -= 1;
        if self.pending == 0 {
            self.fire();
        }
    }

    fn fire(&mut self) {
        if let Some(cb) = self.cb.take() {
            let slots = std::mem::take(&mut self.slots);
            let user_data = std::mem::replace(&mut self.user_data, Value::Null);
            cb(slots, user_data);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::promise::promise::PromiseStatus;
    use crate::backend::server::Server;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    fn server() -> Server {
        Server::new(Uuid::new_v4(), "s", 0)
    }

    #[test]
    fn fires_exactly_once_when_all_slots_settle() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        let cb: PromiseCallback = Box::new(move |_slots, _data| {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        });

        let mut set = PromiseSet::new(2, cb, Value::Null);
        let mut p0 = Promise::new(server(), Duration::from_secs(1), vec![]);
        p0.resolve(PromiseStatus::Success, None);
        set.fill(0, Some(p0));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let mut p1 = Promise::new(server(), Duration::from_secs(1), vec![]);
        p1.resolve(PromiseStatus::Success, None);
        set.fill(1, Some(p1));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn none_slot_settles_immediately() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        let cb: PromiseCallback = Box::new(move |_slots, _data| {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        });

        let mut set = PromiseSet::new(1, cb, Value::Null);
        set.fill(0, None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resolve_slot_settles_an_unresolved_promise_in_place() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        let cb: PromiseCallback = Box::new(move |slots, _data| {
            fired_cb.fetch_add(1, Ordering::SeqCst);
            assert_eq!(slots[0].as_ref().unwrap().status(), PromiseStatus::Success);
        });

        let mut set = PromiseSet::new(1, cb, Value::Null);
        let promise = Promise::new(server(), Duration::from_secs(60), vec![]);
        set.fill(0, Some(promise));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        set.resolve_slot(0, PromiseStatus::Success, Some(vec![9]));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_set_fires_immediately_on_construction() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        let cb: PromiseCallback = Box::new(move |_slots, _data| {
            fired_cb.fetch_add(1, Ordering::SeqCst);
        });
        let _set = PromiseSet::new(0, cb, Value::Null);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
