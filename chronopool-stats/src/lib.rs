//! Plain, `Copy` stats snapshots, refreshed by the components that own
//! the underlying atomics and exposed to `SHOW STATS`-style queries.
//!
//! Grounded on `pgdog-stats`'s `Counts` struct: a flat struct of counters
//! that supports `Sub` so a client can diff two snapshots for a
//! per-interval rate.

pub mod fifo;
pub mod promise;
pub mod query;
pub mod replicator;

pub use fifo::FifoStats;
pub use promise::PromiseStats;
pub use query::QueryStats;
pub use replicator::ReplicatorStats;
