//! A pool: one shard of the cluster, holding zero or more servers, at
//! most one of which is ever the process's own local server (spec §4.2).

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::sync::Arc;

use super::server::Server;

/// A single pool. Cloning a `Pool` clones the handle, not the state — the
/// same shape as `pgdog::backend::pool::Pool`'s `Arc<InnerSync>` wrapper.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

struct Inner {
    id: u16,
    servers: RwLock<Vec<Server>>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.id)
            .field("servers", &self.inner.servers.read().len())
            .finish()
    }
}

impl Pool {
    pub fn new(id: u16) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                servers: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> u16 {
        self.inner.id
    }

    pub fn add(&self, server: Server) {
        self.inner.servers.write().push(server);
    }

    pub fn servers(&self) -> Vec<Server> {
        self.inner.servers.read().clone()
    }

    /// The server in this pool marked `SYNCHRONIZING` and local to this
    /// process, if any (spec §4.2: each pool has at most one local
    /// server, which is its replica-sync target).
    pub fn local(&self) -> Option<Server> {
        self.inner
            .servers
            .read()
            .iter()
            .find(|s| s.is_synchronizing())
            .cloned()
    }

    /// `true` if at least one server in the pool is connected (spec §4.2
    /// `pools.online()`, applied per-pool).
    pub fn online(&self) -> bool {
        self.inner.servers.read().iter().any(|s| s.is_online())
    }

    /// A server available to receive a package right now: connected,
    /// authenticated, and not this process's own local server (spec §11
    /// supplement: `pools.available()` excludes the local pool/server —
    /// the local server is reached directly, not through the promise
    /// fan-out). Picks uniformly at random among eligible servers rather
    /// than always the first — the spec makes no stronger guarantee than
    /// "a" server, and an always-first pick would concentrate every
    /// fan-out on one replica whenever a pool has more than one eligible
    /// member; `pgdog`'s own load-balanced pool picks its target the same
    /// way (`backend::pool::lb::Target`, via `rand::seq::SliceRandom`).
    pub fn available(&self) -> Option<Server> {
        let servers = self.inner.servers.read();
        let eligible: Vec<&Server> = servers
            .iter()
            .filter(|s| s.is_available() && !s.is_synchronizing())
            .collect();
        eligible.choose(&mut rand::rng()).map(|s| (*s).clone())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.servers.read().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use uuid::Uuid;

    fn server(connected: bool, authenticated: bool, local: bool) -> Server {
        let server = Server::new(Uuid::new_v4(), "s", 0);
        if connected {
            server.set(super::super::server::ServerFlags::CONNECTED);
        }
        if authenticated {
            server.set(super::super::server::ServerFlags::AUTHENTICATED);
        }
        if local {
            server.set(super::super::server::ServerFlags::SYNCHRONIZING);
        }
        server
    }

    #[test]
    fn empty_pool_is_offline() {
        let pool = Pool::new(0);
        assert!(!pool.online());
        assert!(pool.available().is_none());
        assert!(pool.local().is_none());
    }

    #[test]
    fn available_excludes_local_server() {
        let pool = Pool::new(0);
        pool.add(server(true, true, true));
        pool.add(server(true, true, false));

        assert!(pool.online());
        let available = pool.available().expect("one available server");
        assert!(!available.is_synchronizing());
    }

    #[test]
    fn local_finds_the_synchronizing_server() {
        let pool = Pool::new(0);
        pool.add(server(true, true, true));
        assert!(pool.local().is_some());
    }

    #[test]
    fn unauthenticated_server_is_online_but_not_available() {
        let pool = Pool::new(0);
        pool.add(server(true, false, false));
        assert!(pool.online());
        assert!(pool.available().is_none());
    }
}
