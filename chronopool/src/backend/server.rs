//! Server record (spec §3).
//!
//! The local server is exclusively owned by the database (one per
//! process); remote records are shared (`Arc`) because they may be pinned
//! by in-flight promises (spec §3: "remote records are shared... because
//! they may be pinned by in-flight promises"). `Server` is therefore a
//! thin, `Clone`-able handle over an `Arc<Inner>`, the same shape pgdog
//! uses for its own pool/connection handles (`Pool` wraps `Arc<InnerSync>`).

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chronopool_config::ServerConfig;
use parking_lot::Mutex;
use uuid::Uuid;

use super::promise::{ResponseSink, Transport};

/// Server flag bits (spec §3). A handful of bits don't warrant pulling in
/// the `bitflags` crate, so this is a small hand-rolled newtype instead.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ServerFlags(pub u32);

impl ServerFlags {
    pub const CONNECTED: ServerFlags = ServerFlags(1 << 0);
    pub const AUTHENTICATED: ServerFlags = ServerFlags(1 << 1);
    pub const SYNCHRONIZING: ServerFlags = ServerFlags(1 << 2);

    pub fn contains(&self, other: ServerFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ServerFlags {
    type Output = ServerFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        ServerFlags(self.0 | rhs.0)
    }
}

/// A server in the cluster: identity plus connection/auth state.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    uuid: Uuid,
    name: String,
    pool: u16,
    flags: AtomicU32,
    /// The outbound connection this server is reachable over (spec §2/§3:
    /// "the promise's server owns the connection it was created for").
    /// `None` until something attaches one — a server discovered in a
    /// test that never calls `attach_transport` is connected/authenticated
    /// on paper but unreachable, same as a server whose socket is still
    /// mid-handshake.
    transport: Mutex<Option<Arc<dyn Transport>>>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("uuid", &self.inner.uuid)
            .field("name", &self.inner.name)
            .field("pool", &self.inner.pool)
            .field("flags", &ServerFlags(self.flags_raw()))
            .finish()
    }
}

impl Server {
    pub fn new(uuid: Uuid, name: impl Into<String>, pool: u16) -> Self {
        Self {
            inner: Arc::new(Inner {
                uuid,
                name: name.into(),
                pool,
                flags: AtomicU32::new(0),
                transport: Mutex::new(None),
            }),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.uuid, config.name.clone(), config.pool)
    }

    pub fn uuid(&self) -> Uuid {
        self.inner.uuid
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn pool(&self) -> u16 {
        self.inner.pool
    }

    fn flags_raw(&self) -> u32 {
        self.inner.flags.load(Ordering::Acquire)
    }

    pub fn flags(&self) -> ServerFlags {
        ServerFlags(self.flags_raw())
    }

    pub fn set(&self, flags: ServerFlags) {
        self.inner.flags.fetch_or(flags.0, Ordering::AcqRel);
    }

    pub fn clear(&self, flags: ServerFlags) {
        self.inner.flags.fetch_and(!flags.0, Ordering::AcqRel);
    }

    pub fn is_connected(&self) -> bool {
        self.flags().contains(ServerFlags::CONNECTED)
    }

    pub fn is_authenticated(&self) -> bool {
        self.flags().contains(ServerFlags::AUTHENTICATED)
    }

    pub fn is_synchronizing(&self) -> bool {
        self.flags().contains(ServerFlags::SYNCHRONIZING)
    }

    /// `connected ∧ authenticated` (spec §3: pool availability predicate).
    pub fn is_available(&self) -> bool {
        self.is_connected() && self.is_authenticated()
    }

    /// `connected` alone (spec §4.2 `pools.online()`).
    pub fn is_online(&self) -> bool {
        self.is_connected()
    }

    /// Attach the outbound connection this server is reachable over (spec
    /// §2/§3). Replaces whatever was attached before.
    pub fn attach_transport(&self, transport: Arc<dyn Transport>) {
        *self.inner.transport.lock() = Some(transport);
    }

    pub fn has_transport(&self) -> bool {
        self.inner.transport.lock().is_some()
    }

    /// Hand `body` to this server's attached transport, tagged `pid`;
    /// `respond` fires exactly once when a matching response (or a
    /// transport-level failure) arrives. Returns `false`, and drops
    /// `respond` without calling it, if nothing is attached — the caller
    /// is then responsible for the promise eventually timing out.
    pub fn send(&self, pid: u64, body: Vec<u8>, respond: ResponseSink) -> bool {
        let transport = self.inner.transport.lock().clone();
        match transport {
            Some(transport) => {
                transport.send(pid, body, respond);
                true
            }
            None => false,
        }
    }
}

impl PartialEq for Server {
    fn eq(&self, other: &Self) -> bool {
        self.inner.uuid == other.inner.uuid
    }
}

impl Eq for Server {}
