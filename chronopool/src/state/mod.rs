//! The process runtime: owns the pool set, the shared series index, and
//! the background tasks that drive replica-sync ticking (spec §4.5) —
//! the one piece of the coordination subsystem that runs on its own
//! clock rather than in response to an incoming query.
//!
//! `execute` is the query entrypoint: snapshot cluster state, walk the
//! caller-supplied parse tree (parsing itself is out of scope, spec
//! §1), then settle any forward request the walk raised. Merging a
//! forward awaits the `PromiseSet` `send_pkg` returns — it resolves the
//! instant every peer pool either has no available server or answers
//! over its attached transport (spec §4.2, §4.6), and otherwise waits
//! out the same timeout each promise in it carries, so this never hangs
//! past `general.promise_timeout_ms`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chronopool_config::{Access, ConfigAndUsers};
use chronopool_stats::QueryStats;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::backend::pools::Pools;
use crate::backend::promise::{Promise, PromiseStatus};
use crate::backend::replication::replicator::ReplicatorAction;
use crate::frontend::access::handle_from_config;
use crate::frontend::context::{LocalData, PoolSummary};
use crate::frontend::dispatch::{self, ForwardKind, ForwardRequest};
use crate::frontend::handlers::default_tables;
use crate::frontend::query::StatementState;
use crate::frontend::{ListenerTables, Node, Query, QueryFlags};

pub struct Runtime {
    config: Arc<ConfigAndUsers>,
    pools: Arc<Pools>,
    series: crate::frontend::SeriesIndex,
    tables: ListenerTables,
    started_at: Instant,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    query_stats: Mutex<QueryStats>,
}

impl Runtime {
    pub fn new(config: Arc<ConfigAndUsers>) -> Result<Self, crate::Error> {
        let local_uuid = config
            .config
            .servers
            .iter()
            .find(|s| s.is_local)
            .map(|s| s.uuid)
            .ok_or(crate::backend::Error::LocalServerMissing)?;
        let pools = Pools::build(&config.config, local_uuid)?;

        Ok(Self {
            config,
            pools: Arc::new(pools),
            series: Arc::new(parking_lot::Mutex::new(Vec::new())),
            tables: default_tables(),
            started_at: Instant::now(),
            tasks: Mutex::new(Vec::new()),
            query_stats: Mutex::new(QueryStats::default()),
        })
    }

    pub fn query_stats(&self) -> QueryStats {
        *self.query_stats.lock()
    }

    pub fn promise_stats(&self) -> chronopool_stats::PromiseStats {
        self.pools.promise_stats()
    }

    /// Start the replicator's tick loop, if this process hosts a replica
    /// (spec §4.5), and the promise timeout sweep. `shutdown` stops both.
    pub fn launch(&self) {
        self.launch_promise_sweep();

        let Some(replicator) = self.pools.replicator() else {
            return;
        };
        replicator.start();

        let pools = self.pools.clone();
        let tick_ms = replicator.tick_ms().max(1);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
            loop {
                interval.tick().await;
                let Some(replicator) = pools.replicator() else {
                    break;
                };
                match replicator.tick() {
                    ReplicatorAction::SendPacket(body) => {
                        // The connection that carries this to the replica
                        // is a named external interface (spec §1); this
                        // subsystem's job ends at deciding what goes out.
                        info!(bytes = body.len(), "replicator has a packet ready to send");
                    }
                    ReplicatorAction::SendInitRepl(series_id) => {
                        info!(series_id, "replicator would tag series INIT_REPL on the replica");
                    }
                    ReplicatorAction::SendReplFinished => {
                        info!("replicator would send REPL_FINISHED to the replica");
                    }
                    ReplicatorAction::None => {}
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Resolve every promise past its deadline with `TimeoutError` (spec
    /// §4.6: "a single timer... scans for expired pids"), on the same
    /// cadence as the replicator tick. Runs regardless of whether this
    /// process hosts a replica — a pure query-routing node still fans
    /// requests out via `send_pkg` and needs its promises swept.
    fn launch_promise_sweep(&self) {
        let pools = self.pools.clone();
        let tick_ms = self
            .pools
            .replicator()
            .map(|r| r.tick_ms())
            .unwrap_or(100)
            .max(1);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
            loop {
                interval.tick().await;
                pools.pending_promises().sweep_expired(Instant::now());
            }
        });
        self.tasks.lock().push(handle);
    }

    pub fn shutdown(&self) {
        if let Some(replicator) = self.pools.replicator() {
            replicator.close();
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Run one statement's parse tree through the listener dispatch and
    /// settle any resulting forward request (spec §4.3, §4.4).
    pub async fn execute(&self, tree: &Node, user_access: Access, flags: QueryFlags, text: impl Into<String>) -> Query {
        self.query_stats.lock().received += 1;

        let local = self.snapshot();
        let mut query = Query::new(text, flags, user_access);
        let forwards = dispatch::walk(&self.tables, &tree, &mut query, &local);

        if !query.has_failed() {
            if !forwards.is_empty() {
                self.query_stats.lock().forwarded += 1;
            }
            for forward in forwards {
                self.settle_forward(&mut query, forward).await;
            }
        }

        let mut stats = self.query_stats.lock();
        if query.has_failed() {
            stats.errors += 1;
        } else {
            stats.completed += 1;
        }
        stats.query_time += query.elapsed();

        query
    }

    fn snapshot(&self) -> LocalData {
        let pools = self
            .pools
            .pools()
            .iter()
            .map(|p| PoolSummary {
                id: p.id(),
                online: p.online(),
                available: p.available().is_some(),
            })
            .collect();

        let users = self
            .config
            .users
            .users
            .iter()
            .map(handle_from_config)
            .collect();

        LocalData {
            local_pool_id: self.pools.local_pool_id(),
            local_server_name: self.pools.local_server().name().to_string(),
            pools,
            servers: self.pools.all_servers(),
            users,
            series: self.series.clone(),
            where_depth_limit: self.config.config.general.where_depth_limit,
            default_limit: self.config.config.general.default_limit,
            started_at: self.started_at,
        }
    }

    async fn settle_forward(&self, query: &mut Query, forward: ForwardRequest) {
        let timeout = Duration::from_millis(self.config.config.general.promise_timeout_ms);
        let (tx, rx) = tokio::sync::oneshot::channel();

        // `send_pkg`'s callback fires exactly once (spec §8 invariant 5),
        // whether that happens inline on this call (every peer pool
        // already settled — no server available, or a transport answered
        // synchronously) or later from a response callback / the timeout
        // sweep running on `Runtime::launch`'s background task.
        let _set = self.pools.send_pkg(
            forward.pkg,
            timeout,
            Box::new(move |slots, _user_data| {
                let _ = tx.send(slots);
            }),
            serde_json::Value::Null,
        );

        // The sender side is only ever dropped by the `PromiseSet` itself
        // firing its callback, so a `RecvError` here would mean the set
        // was dropped without ever settling — a logic error upstream, not
        // a case this path needs to paper over with a silent fallback.
        let slots = rx.await.expect("PromiseSet always fires its callback exactly once");

        self.pools.record_promise_results(&slots);
        finalize_forward(query, forward.kind, slots);
    }
}

fn finalize_forward(query: &mut Query, kind: ForwardKind, slots: Vec<Option<Promise>>) {
    let successful_bodies = |slots: Vec<Option<Promise>>| {
        slots
            .into_iter()
            .flatten()
            .filter(|p| p.status() == PromiseStatus::Success)
            .filter_map(|p| p.data().map(<[u8]>::to_vec))
            .collect::<Vec<_>>()
    };

    match kind {
        ForwardKind::ListEntity(entity) => {
            let mut timeit_entries = Vec::new();
            for body in successful_bodies(slots) {
                timeit_entries.extend(crate::frontend::merge::on_list_response(
                    query,
                    entity.key(),
                    &body,
                ));
            }
            query.packer.array_close();
            if !timeit_entries.is_empty() {
                query.packer.push_str("__timeit__");
                query.packer.array_open();
                for entry in &timeit_entries {
                    query.packer.push_value(entry);
                }
                query.packer.array_close();
            }
            query.packer.map_close();
        }
        ForwardKind::CountEntity(entity) => {
            let mut total = match &query.data {
                StatementState::Count(s) => s.count,
                _ => 0,
            };
            for body in successful_bodies(slots) {
                total += crate::frontend::merge::on_count_response(&body, entity.key());
            }
            if let StatementState::Count(s) = &mut query.data {
                s.count = total;
            }
            query.packer.push_str(entity.key());
            query.packer.push_int(total);
            query.packer.map_close();
        }
    }
}
