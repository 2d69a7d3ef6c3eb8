//! The pool set: the full ordered collection of pools in the cluster,
//! plus the fan-out primitive that drives a request to every peer pool
//! (spec §4.2).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::Error;
use super::lookup::gen_lookup;
use super::pool_impl::Pool;
use super::promise::{PendingPromises, Promise, PromiseCallback, PromiseSet, PromiseStatus};
use super::replication::fifo::Fifo;
use super::replication::init_file::InitFile;
use super::replication::replicator::Replicator;
use super::server::{Server, ServerFlags};
use crate::backend::lookup::SeriesLookup;
use chronopool_config::Config;
use chronopool_stats::PromiseStats;

/// Ordered collection of pools (spec §4.2). Owns the series→pool lookup
/// table for the current topology and, when this process hosts a local
/// pool with a replica, the FIFO + Replicator pair that drains it.
pub struct Pools {
    local_pool: u16,
    local_server: Server,
    pools: Vec<Pool>,
    lookup: SeriesLookup,
    replica: Option<Server>,
    fifo: Option<Arc<Fifo>>,
    replicator: Option<Replicator>,
    promise_stats: Mutex<PromiseStats>,
    pending_promises: PendingPromises,
}

impl Pools {
    /// Build the pool set from the loaded configuration (spec §4.2,
    /// two-pass construction).
    pub fn build(config: &Config, local_server_uuid: Uuid) -> Result<Self, Error> {
        let max_pool_id = config
            .max_pool_id()
            .ok_or(Error::NoPools)?;
        let num_pools = max_pool_id as usize + 1;

        let mut pools: Vec<Pool> = (0..num_pools as u16).map(Pool::new).collect();

        let local_server = config
            .servers
            .iter()
            .find(|s| s.uuid == local_server_uuid)
            .ok_or(Error::LocalServerMissing)?;
        let local_pool = local_server.pool;

        let mut replica: Option<Server> = None;
        let mut local_handle: Option<Server> = None;

        for server_cfg in &config.servers {
            let server = Server::from_config(server_cfg);
            if server_cfg.uuid == local_server_uuid {
                server.set(ServerFlags::CONNECTED | ServerFlags::AUTHENTICATED);
                local_handle = Some(server.clone());
            } else if server_cfg.pool == local_pool {
                // Another server in our own pool: the replica we stream to.
                replica = Some(server.clone());
            }
            pools[server_cfg.pool as usize].add(server);
        }

        let (fifo, replicator) = if let (Some(local), Some(replica)) =
            (local_handle.as_ref(), replica.as_ref())
        {
            local.set(ServerFlags::SYNCHRONIZING);

            let data_dir = Path::new(&config.replication.data_dir);
            let fifo = Arc::new(Fifo::open(data_dir.join("fifo.log"))?);

            let init_file_path = data_dir.join(&config.replication.init_file);
            let replicator = Replicator::new(
                local.clone(),
                replica.clone(),
                fifo.clone(),
                config.replication.tick_ms,
            );
            if InitFile::exists(&init_file_path) {
                // Boot found a `.replicate` marker from a prior initial-sync
                // bootstrap (spec §4.5, §11): tag the listed series before
                // the first tick so the initial streaming pass targets them.
                let ids = InitFile::consume(&init_file_path)?;
                info!("replaying {} series from \"{}\"", ids.len(), init_file_path.display());
                replicator.set_init_repl(ids);
            }

            (Some(fifo), Some(replicator))
        } else {
            (None, None)
        };

        let lookup = gen_lookup(num_pools as u16);
        let local_server = local_handle.expect("local server resolved above");

        Ok(Self {
            local_pool,
            local_server,
            pools,
            lookup,
            replica,
            fifo,
            replicator,
            promise_stats: Mutex::new(PromiseStats::default()),
            pending_promises: PendingPromises::new(),
        })
    }

    /// Registry bridging a promise's pid to the slot awaiting it, shared
    /// between `send_pkg`'s transport callbacks and the periodic timeout
    /// sweep (spec §4.6).
    pub fn pending_promises(&self) -> &PendingPromises {
        &self.pending_promises
    }

    pub fn local_pool_id(&self) -> u16 {
        self.local_pool
    }

    pub fn local_server(&self) -> &Server {
        &self.local_server
    }

    /// Every server in the cluster, across every pool (spec §4.2: full
    /// cluster topology is known to every node from configuration).
    pub fn all_servers(&self) -> Vec<Server> {
        self.pools.iter().flat_map(|p| p.servers()).collect()
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn num_pools(&self) -> usize {
        self.pools.len()
    }

    pub fn lookup(&self) -> &SeriesLookup {
        &self.lookup
    }

    pub fn replica(&self) -> Option<&Server> {
        self.replica.as_ref()
    }

    pub fn fifo(&self) -> Option<&Arc<Fifo>> {
        self.fifo.as_ref()
    }

    pub fn replicator(&self) -> Option<&Replicator> {
        self.replicator.as_ref()
    }

    pub fn promise_stats(&self) -> PromiseStats {
        *self.promise_stats.lock()
    }

    /// Fold one fan-out's settled slots into the running counters, for
    /// `SHOW STATS`-style introspection (spec §4.6). Called by
    /// `state::Runtime` once a `PromiseSet`'s aggregate callback fires.
    pub fn record_promise_results(&self, slots: &[Option<Promise>]) {
        let mut stats = self.promise_stats.lock();
        let mut any_none = false;
        for slot in slots {
            match slot {
                Some(promise) => {
                    stats.sent += 1;
                    match promise.status() {
                        PromiseStatus::Success => stats.success += 1,
                        PromiseStatus::WriteError => stats.write_error += 1,
                        PromiseStatus::TimeoutError => stats.timeout_error += 1,
                        PromiseStatus::CancelledError => stats.cancelled_error += 1,
                        PromiseStatus::TypeError => stats.type_error += 1,
                        PromiseStatus::Pending => {}
                    }
                }
                None => any_none = true,
            }
        }
        if any_none {
            stats.partial_sets += 1;
        }
    }

    fn peer_pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools
            .iter()
            .enumerate()
            .filter(move |(id, _)| *id as u16 != self.local_pool)
            .map(|(_, pool)| pool)
    }

    /// `true` unless some peer pool has zero online servers (spec §4.2).
    pub fn online(&self) -> bool {
        self.peer_pools().all(|pool| pool.online())
    }

    /// `true` unless some peer pool has zero available servers (spec
    /// §4.2).
    pub fn available(&self) -> bool {
        self.peer_pools().all(|pool| pool.available().is_some())
    }

    /// Fan a package out to one server per peer pool, gathering the
    /// responses into a single `PromiseSet` (spec §4.2, §4.6). Pools with
    /// no available server contribute a `None` slot rather than blocking
    /// the set. The returned set resolves asynchronously as responses
    /// come back over each server's attached transport (or as the
    /// timeout sweep closes out ones that never do); it does not block
    /// here and may still be fully pending when this returns.
    pub fn send_pkg(
        &self,
        pkg: Vec<u8>,
        timeout: Duration,
        cb: PromiseCallback,
        user_data: serde_json::Value,
    ) -> Arc<Mutex<PromiseSet>> {
        let peers: Vec<&Pool> = self.peer_pools().collect();
        let set = Arc::new(Mutex::new(PromiseSet::new(peers.len(), cb, user_data)));

        for (slot, pool) in peers.iter().enumerate() {
            match pool.available() {
                Some(server) => {
                    let promise = Promise::new(server.clone(), timeout, pkg.clone());
                    let pid = promise.id();
                    set.lock().fill(slot, Some(promise));

                    // Register before sending: a test (or real) transport
                    // may call `respond` synchronously, before `send`
                    // even returns.
                    self.pending_promises.register(pid, set.clone(), slot);

                    let pending = self.pending_promises.clone();
                    let sent = server.send(
                        pid,
                        pkg.clone(),
                        Box::new(move |status, data| {
                            pending.resolve(pid, status, data);
                        }),
                    );
                    if !sent {
                        debug!(
                            "server '{}' has no transport attached; promise {} resolves only by timeout",
                            server.name(),
                            pid
                        );
                    }
                }
                None => {
                    debug!("Cannot send package to pool '{}'", pool.id());
                    set.lock().fill(slot, None);
                }
            }
        }

        set
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chronopool_config::{Config, General, Replication, ServerConfig};

    fn two_pool_config(local_uuid: Uuid) -> Config {
        Config {
            general: General::default(),
            replication: Replication::default(),
            servers: vec![
                ServerConfig {
                    uuid: local_uuid,
                    name: "local".into(),
                    pool: 0,
                    host: "127.0.0.1".into(),
                    port: 9000,
                    is_local: true,
                },
                ServerConfig {
                    uuid: Uuid::new_v4(),
                    name: "peer".into(),
                    pool: 1,
                    host: "127.0.0.1".into(),
                    port: 9001,
                    is_local: false,
                },
            ],
        }
    }

    #[test]
    fn builds_one_pool_per_distinct_pool_id() {
        let local = Uuid::new_v4();
        let config = two_pool_config(local);
        let pools = Pools::build(&config, local).unwrap();
        assert_eq!(pools.num_pools(), 2);
        assert_eq!(pools.local_pool_id(), 0);
    }

    #[test]
    fn peer_with_no_server_is_offline_and_unavailable() {
        let local = Uuid::new_v4();
        let mut config = two_pool_config(local);
        config.servers.truncate(1);
        let pools = Pools::build(&config, local).unwrap();
        assert!(!pools.online());
        assert!(!pools.available());
    }

    #[test]
    fn missing_local_server_is_an_error() {
        let config = two_pool_config(Uuid::new_v4());
        let result = Pools::build(&config, Uuid::new_v4());
        assert!(result.is_err());
    }

    #[test]
    fn record_promise_results_counts_a_partial_set() {
        // S6 (spec §6): one dead peer pool contributes a `None` slot; the
        // set still fires, and the counters must reflect both the
        // settled promise and the partial fan-out.
        let local = Uuid::new_v4();
        let config = two_pool_config(local);
        let pools = Pools::build(&config, local).unwrap();

        let mut promise = Promise::new(Server::new(Uuid::new_v4(), "peer", 1), Duration::from_secs(1), vec![]);
        promise.resolve(PromiseStatus::Success, None);
        pools.record_promise_results(&[Some(promise), None]);

        let stats = pools.promise_stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.partial_sets, 1);
    }

    #[test]
    fn send_pkg_resolves_through_an_attached_transport() {
        // S2 (spec §6): a peer pool has an available, reachable server —
        // its response must actually reach the `PromiseSet`, not just sit
        // there until the `warn!` fallback gives up on it.
        use crate::backend::promise::test_support::{FakeTransport, ScriptedReply};
        use std::sync::atomic::{AtomicUsize, Ordering};

        let local = Uuid::new_v4();
        let config = two_pool_config(local);
        let pools = Pools::build(&config, local).unwrap();

        // Pools::build only marks the local server connected/authenticated
        // (spec §3: the real handshake for a peer is out of scope here);
        // flip the peer's flags directly, the way the out-of-scope
        // connection layer eventually would.
        let peer = pools.pools()[1].servers().into_iter().next().expect("peer configured");
        peer.set(ServerFlags::CONNECTED | ServerFlags::AUTHENTICATED);
        peer.attach_transport(FakeTransport::new(ScriptedReply::Respond(
            PromiseStatus::Success,
            Some(b"{\"series\":7}".to_vec()),
        )));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        let set = pools.send_pkg(
            b"pkg".to_vec(),
            Duration::from_secs(5),
            Box::new(move |slots, _data| {
                fired_cb.fetch_add(1, Ordering::SeqCst);
                assert_eq!(slots.len(), 1);
                assert_eq!(slots[0].as_ref().unwrap().status(), PromiseStatus::Success);
            }),
            serde_json::Value::Null,
        );

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(set.lock().pending(), 0);
        assert_eq!(pools.pending_promises().len(), 0);
    }

    #[test]
    fn send_pkg_without_a_transport_only_settles_on_timeout_sweep() {
        // S6 (spec §6): a peer server is available on paper but has no
        // transport attached — the promise must sit pending, not fire
        // immediately, and the sweep must still be able to close it out.
        use std::sync::atomic::{AtomicUsize, Ordering};

        let local = Uuid::new_v4();
        let config = two_pool_config(local);
        let pools = Pools::build(&config, local).unwrap();

        let peer = pools.pools()[1].servers().into_iter().next().expect("peer configured");
        peer.set(ServerFlags::CONNECTED | ServerFlags::AUTHENTICATED);

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_cb = fired.clone();
        let _set = pools.send_pkg(
            b"pkg".to_vec(),
            Duration::from_secs(0),
            Box::new(move |_slots, _data| {
                fired_cb.fetch_add(1, Ordering::SeqCst);
            }),
            serde_json::Value::Null,
        );

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(pools.pending_promises().len(), 1);

        pools.pending_promises().sweep_expired(std::time::Instant::now());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(pools.pending_promises().len(), 0);
    }
}
