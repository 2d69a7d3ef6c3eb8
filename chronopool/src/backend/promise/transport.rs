//! The outbound half of a server connection (spec §2/§3).
//!
//! Everything else in `promise/` is transport-agnostic bookkeeping; this
//! is the one seam where the actual (out-of-scope, spec §1) socket layer
//! plugs in. A `Server` with nothing attached simply can't be reached —
//! `send_pkg` still creates a promise for it, which then resolves only by
//! timeout.

use super::promise::PromiseStatus;

/// Called by a `Transport` exactly once per `send`, with the outcome of
/// the request it was given.
pub type ResponseSink = Box<dyn FnOnce(PromiseStatus, Option<Vec<u8>>) + Send>;

/// Whatever owns the real connection to a peer server implements this and
/// is attached via `Server::attach_transport`.
pub trait Transport: Send + Sync {
    /// Hand `body` off to the remote server, tagged with `pid` so the
    /// eventual response can be matched back (spec §4.6: "responses are
    /// matched by pid"). `respond` must be called exactly once, whether
    /// that's a real response, a write failure, or the connection
    /// dropping before one arrived.
    fn send(&self, pid: u64, body: Vec<u8>, respond: ResponseSink);
}

#[cfg(test)]
pub mod test_support {
    //! A synchronous, in-memory `Transport` for exercising the fan-out
    //! pipeline without a real socket.

    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{PromiseStatus, ResponseSink, Transport};

    /// Scripted reply for one `send` call.
    #[derive(Clone)]
    pub enum ScriptedReply {
        Respond(PromiseStatus, Option<Vec<u8>>),
        /// Accept the send but never call `respond` (the promise only
        /// settles via the timeout sweep).
        Silent,
    }

    /// Replies with the same scripted outcome to every request it
    /// receives, recording the pids it was asked to send.
    pub struct FakeTransport {
        reply: ScriptedReply,
        sent: Mutex<Vec<u64>>,
    }

    impl FakeTransport {
        pub fn new(reply: ScriptedReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                sent: Mutex::new(Vec::new()),
            })
        }

        pub fn sent_pids(&self) -> Vec<u64> {
            self.sent.lock().clone()
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, pid: u64, _body: Vec<u8>, respond: ResponseSink) {
            self.sent.lock().push(pid);
            match self.reply.clone() {
                ScriptedReply::Respond(status, data) => respond(status, data),
                ScriptedReply::Silent => {}
            }
        }
    }
}
