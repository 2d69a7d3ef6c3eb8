//! The per-pool replica-sync state machine (spec §4.5).
//!
//! One `Replicator` drains one `Fifo` toward one replica `Server`. It
//! does not own a socket or a timer itself — `tick()` is the pure
//! transition function, called by the owning runtime on a 100ms
//! interval, returning what (if anything) should be sent this tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use chronopool_stats::ReplicatorState;

use super::fifo::Fifo;
use crate::backend::promise::PromiseStatus;
use crate::backend::server::Server;

/// What the owning runtime should do as a result of a `tick()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicatorAction {
    /// Send this packet to the replica; the caller is responsible for
    /// wiring the eventual promise response back into `on_response`.
    SendPacket(Vec<u8>),
    /// Tag this series `INIT_REPL` on the replica before anything else
    /// goes out this tick (spec §4.5, §11 supplement): the initial
    /// streaming snapshot for a series restored from a `.replicate`
    /// marker must target it before regular FIFO traffic resumes.
    SendInitRepl(u32),
    /// Initial sync has drained the FIFO and the replica is still
    /// catching up: tell it there is nothing more coming for now.
    SendReplFinished,
    /// Nothing to do this tick.
    None,
}

pub struct Replicator {
    /// This process's own server handle. `SYNCHRONIZING` is set here, not
    /// on `replica` (spec §4.2, mirroring `original_source/pools.c`'s
    /// `POOLS_arrange`, which tags `siridb->server` — the local handle —
    /// not the peer it streams to).
    local: Server,
    replica: Server,
    fifo: Arc<Fifo>,
    tick_ms: u64,
    state: Mutex<ReplicatorState>,
    ticks: AtomicUsize,
    /// Series ids tagged `INIT_REPL` from a `.replicate` marker found on
    /// boot (spec §4.5, §11 supplement). Drained one per tick via
    /// `SendInitRepl` before `SendReplFinished` is ever returned.
    init_repl: Mutex<Vec<u32>>,
}

impl Replicator {
    pub fn new(local: Server, replica: Server, fifo: Arc<Fifo>, tick_ms: u64) -> Self {
        Self {
            local,
            replica,
            fifo,
            tick_ms,
            state: Mutex::new(ReplicatorState::Idle),
            ticks: AtomicUsize::new(0),
            init_repl: Mutex::new(Vec::new()),
        }
    }

    /// Tag series ids for initial replication, read from the `.replicate`
    /// marker file on boot (spec §11 supplement).
    pub fn set_init_repl(&self, series_ids: Vec<u32>) {
        *self.init_repl.lock() = series_ids;
    }

    /// Series ids still pending their first streaming pass.
    pub fn init_repl(&self) -> Vec<u32> {
        self.init_repl.lock().clone()
    }

    pub fn state(&self) -> ReplicatorState {
        *self.state.lock()
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn stats(&self) -> chronopool_stats::ReplicatorStats {
        chronopool_stats::ReplicatorStats {
            state: self.state(),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }

    /// `start(IDLE) -> RUNNING`. No-op from any other state.
    pub fn start(&self) {
        let mut state = self.state.lock();
        if *state == ReplicatorState::Idle {
            *state = ReplicatorState::Running;
        }
    }

    /// `pause(IDLE) -> PAUSED` immediately; `pause(RUNNING) -> STOPPING`,
    /// waiting for the current tick's in-flight work to drain.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        *state = match *state {
            ReplicatorState::Idle => ReplicatorState::Paused,
            ReplicatorState::Running => ReplicatorState::Stopping,
            other => other,
        };
    }

    /// `continue(STOPPING) -> RUNNING`; `continue(PAUSED | IDLE) -> RUNNING`
    /// (spec: "IDLE then start").
    pub fn continue_(&self) {
        let mut state = self.state.lock();
        *state = match *state {
            ReplicatorState::Stopping | ReplicatorState::Paused | ReplicatorState::Idle => {
                ReplicatorState::Running
            }
            other => other,
        };
    }

    /// Terminal: stops the timer conceptually (the caller simply stops
    /// calling `tick`) and forbids any further transition.
    pub fn close(&self) {
        *self.state.lock() = ReplicatorState::Closed;
    }

    /// Advance one timer tick. Applies while `RUNNING` or `STOPPING` (a
    /// stop request still drains outstanding work before settling).
    pub fn tick(&self) -> ReplicatorAction {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if !matches!(*state, ReplicatorState::Running | ReplicatorState::Stopping) {
            return ReplicatorAction::None;
        }

        // `local.is_synchronizing()` is the authoritative "initial sync in
        // progress" flag (spec §4.5) — `Pools::build` only ever sets
        // `SYNCHRONIZING` on this process's own handle, never on `replica`.
        let initial_sync = self.local.is_synchronizing();
        let replica_ready = self.replica.is_available() || initial_sync;

        if replica_ready {
            let mut init_repl = self.init_repl.lock();
            if let Some(series_id) = init_repl.pop() {
                return ReplicatorAction::SendInitRepl(series_id);
            }
        }

        if self.fifo.has_data() && replica_ready {
            let (_, body) = self.fifo.peek().expect("has_data implied a record");
            return ReplicatorAction::SendPacket(body);
        }

        if initial_sync && self.fifo.is_empty() && self.init_repl.lock().is_empty() {
            return ReplicatorAction::SendReplFinished;
        }

        *state = if *state == ReplicatorState::Stopping {
            ReplicatorState::Paused
        } else {
            ReplicatorState::Idle
        };
        ReplicatorAction::None
    }

    /// React to the promise response for the packet most recently sent
    /// (spec §4.5 response table). The timer is always rearmed by the
    /// caller after this returns, regardless of outcome.
    pub fn on_response(&self, status: PromiseStatus, response_is_error_type: bool) {
        match status {
            PromiseStatus::Success if !response_is_error_type => {
                let _ = self.fifo.commit();
            }
            PromiseStatus::Success => {
                tracing::warn!("replica returned an error response to a replicated packet");
                let _ = self.fifo.commit_err();
            }
            PromiseStatus::TimeoutError | PromiseStatus::CancelledError | PromiseStatus::TypeError => {
                let _ = self.fifo.commit_err();
            }
            PromiseStatus::WriteError | PromiseStatus::Pending => {
                // Leave the record in place; the next tick retries it.
            }
        }
    }

    /// Mark `REPL_FINISHED` acknowledged (spec §4.5 `BPROTO_ACK_REPL_FINISHED`).
    pub fn on_repl_finished_ack(&self) {
        tracing::debug!("replica acknowledged REPL_FINISHED");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;
    use uuid::Uuid;

    /// This process's own handle. `synchronizing` models `Pools::build`
    /// having set `SYNCHRONIZING` on it because a `.replicate` marker (or
    /// a fresh node with no prior state) put it mid initial-sync.
    fn local(synchronizing: bool) -> Server {
        let server = Server::new(Uuid::new_v4(), "local", 0);
        server.set(crate::backend::server::ServerFlags::CONNECTED);
        server.set(crate::backend::server::ServerFlags::AUTHENTICATED);
        if synchronizing {
            server.set(crate::backend::server::ServerFlags::SYNCHRONIZING);
        }
        server
    }

    fn replica(available: bool) -> Server {
        let server = Server::new(Uuid::new_v4(), "replica", 0);
        if available {
            server.set(crate::backend::server::ServerFlags::CONNECTED);
            server.set(crate::backend::server::ServerFlags::AUTHENTICATED);
        }
        server
    }

    fn fifo() -> Arc<Fifo> {
        let dir = tempdir().unwrap();
        Arc::new(Fifo::open(dir.path().join("fifo.log")).unwrap())
    }

    #[test]
    fn start_moves_idle_to_running() {
        let replicator = Replicator::new(local(false), replica(true), fifo(), 100);
        assert_eq!(replicator.state(), ReplicatorState::Idle);
        replicator.start();
        assert_eq!(replicator.state(), ReplicatorState::Running);
    }

    #[test]
    fn tick_with_no_data_and_no_sync_drops_to_idle() {
        let replicator = Replicator::new(local(false), replica(true), fifo(), 100);
        replicator.start();
        let action = replicator.tick();
        assert_eq!(action, ReplicatorAction::None);
        assert_eq!(replicator.state(), ReplicatorState::Idle);
    }

    #[test]
    fn tick_sends_the_head_packet_when_data_is_pending() {
        let fifo = fifo();
        fifo.push(b"hello".to_vec()).unwrap();
        let replicator = Replicator::new(local(false), replica(true), fifo, 100);
        replicator.start();

        let action = replicator.tick();
        assert_eq!(action, ReplicatorAction::SendPacket(b"hello".to_vec()));
        // Sending alone doesn't commit; the record is still pending.
        assert_eq!(replicator.state(), ReplicatorState::Running);
    }

    #[test]
    fn write_error_leaves_record_for_retry_then_success_commits() {
        // S5 (spec §6).
        let fifo = fifo();
        fifo.push(b"pkt".to_vec()).unwrap();
        let replicator = Replicator::new(local(false), replica(true), fifo, 100);
        replicator.start();

        replicator.tick();
        replicator.on_response(PromiseStatus::WriteError, false);
        assert!(replicator.fifo.has_data());

        replicator.tick();
        replicator.on_response(PromiseStatus::Success, false);
        assert!(!replicator.fifo.has_data());
    }

    #[test]
    fn synchronizing_local_gets_repl_finished_once_fifo_and_init_repl_drain() {
        // The flag that matters lives on `local`, not `replica` — a
        // replica that hasn't even authenticated yet must still get
        // `REPL_FINISHED` once this side has nothing left to stream.
        let replicator = Replicator::new(local(true), replica(false), fifo(), 100);
        replicator.start();
        let action = replicator.tick();
        assert_eq!(action, ReplicatorAction::SendReplFinished);
    }

    #[test]
    fn a_synchronizing_replica_handle_alone_does_not_trigger_repl_finished() {
        // Guards against the old bug: setting `SYNCHRONIZING` on `replica`
        // instead of `local` must no longer do anything.
        let replica = replica(false);
        replica.set(crate::backend::server::ServerFlags::SYNCHRONIZING);
        let replicator = Replicator::new(local(false), replica, fifo(), 100);
        replicator.start();
        let action = replicator.tick();
        assert_eq!(action, ReplicatorAction::None);
    }

    #[test]
    fn init_repl_entries_are_sent_before_repl_finished() {
        let replicator = Replicator::new(local(true), replica(false), fifo(), 100);
        replicator.set_init_repl(vec![1, 2]);
        replicator.start();

        assert_eq!(replicator.tick(), ReplicatorAction::SendInitRepl(2));
        assert_eq!(replicator.tick(), ReplicatorAction::SendInitRepl(1));
        assert_eq!(replicator.tick(), ReplicatorAction::SendReplFinished);
        assert!(replicator.init_repl().is_empty());
    }

    #[test]
    fn init_repl_entries_wait_for_the_replica_to_be_ready() {
        // Not yet `SYNCHRONIZING` and the replica isn't connected either:
        // nothing should be popped off `init_repl` until one of those
        // becomes true.
        let replicator = Replicator::new(local(false), replica(false), fifo(), 100);
        replicator.set_init_repl(vec![1]);
        replicator.start();

        assert_eq!(replicator.tick(), ReplicatorAction::None);
        assert_eq!(replicator.init_repl(), vec![1]);
    }

    #[test]
    fn pause_while_running_goes_to_stopping_then_drains_to_paused() {
        let replicator = Replicator::new(local(false), replica(true), fifo(), 100);
        replicator.start();
        replicator.pause();
        assert_eq!(replicator.state(), ReplicatorState::Stopping);

        replicator.tick();
        assert_eq!(replicator.state(), ReplicatorState::Paused);
    }

    #[test]
    fn continue_from_paused_returns_to_running() {
        let replicator = Replicator::new(local(false), replica(true), fifo(), 100);
        replicator.start();
        replicator.pause();
        assert_eq!(replicator.state(), ReplicatorState::Paused);

        replicator.continue_();
        assert_eq!(replicator.state(), ReplicatorState::Running);
    }

    #[test]
    fn close_is_terminal() {
        let replicator = Replicator::new(local(false), replica(true), fifo(), 100);
        replicator.start();
        replicator.close();
        assert_eq!(replicator.state(), ReplicatorState::Closed);

        replicator.continue_();
        assert_eq!(replicator.state(), ReplicatorState::Closed);
    }
}
