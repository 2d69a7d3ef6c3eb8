//! A single outstanding RPC to one server (spec §3, §4.6).

use std::time::{Duration, Instant};

use crate::backend::server::Server;

/// How a promise settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseStatus {
    Pending,
    Success,
    WriteError,
    TimeoutError,
    CancelledError,
    TypeError,
}

/// One outstanding request to a remote server.
///
/// Created by `send_pkg`, resolved exactly once — either by a matching
/// response pid, by timeout, or by cancellation on connection drop (spec
/// §4.6) — and then handed to its single callback or folded into a
/// `PromiseSet`.
pub struct Promise {
    id: u64,
    server: Server,
    deadline: Instant,
    body: Vec<u8>,
    status: PromiseStatus,
    data: Option<Vec<u8>>,
}

impl Promise {
    pub fn new(server: Server, timeout: Duration, body: Vec<u8>) -> Self {
        Self {
            id: crate::unique_id::next(),
            server,
            deadline: Instant::now() + timeout,
            body,
            status: PromiseStatus::Pending,
            data: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn status(&self) -> PromiseStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == PromiseStatus::Pending
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.is_pending() && now >= self.deadline
    }

    /// Resolve with a response payload (spec §4.6: "responses are matched
    /// by pid"). No-op if already resolved — a promise settles once.
    pub fn resolve(&mut self, status: PromiseStatus, data: Option<Vec<u8>>) {
        if !self.is_pending() {
            return;
        }
        self.status = status;
        self.data = data;
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn take_data(&mut self) -> Option<Vec<u8>> {
        self.data.take()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use uuid::Uuid;

    fn server() -> Server {
        Server::new(Uuid::new_v4(), "s", 0)
    }

    #[test]
    fn starts_pending() {
        let promise = Promise::new(server(), Duration::from_secs(1), vec![]);
        assert!(promise.is_pending());
        assert_eq!(promise.status(), PromiseStatus::Pending);
    }

    #[test]
    fn resolves_exactly_once() {
        let mut promise = Promise::new(server(), Duration::from_secs(1), vec![]);
        promise.resolve(PromiseStatus::Success, Some(vec![1, 2, 3]));
        assert_eq!(promise.status(), PromiseStatus::Success);

        // A second resolution attempt (e.g. a late timeout firing after the
        // response already arrived) must not overwrite the first outcome.
        promise.resolve(PromiseStatus::TimeoutError, None);
        assert_eq!(promise.status(), PromiseStatus::Success);
        assert_eq!(promise.data(), Some([1, 2, 3].as_slice()));
    }

    #[test]
    fn expires_only_after_deadline_while_pending() {
        let promise = Promise::new(server(), Duration::from_secs(0), vec![]);
        assert!(promise.is_expired(Instant::now()));
    }

    #[test]
    fn resolved_promise_never_reports_expired() {
        let mut promise = Promise::new(server(), Duration::from_secs(0), vec![]);
        promise.resolve(PromiseStatus::Success, None);
        assert!(!promise.is_expired(Instant::now()));
    }
}
