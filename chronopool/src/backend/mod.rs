//! Cluster backend: pools, servers, the series→pool lookup table, the
//! inter-pool promise fan-out, and per-pool replica synchronization (spec
//! §3, §4.1-§4.6).

pub mod error;
pub mod lookup;
pub mod pool_impl;
pub mod pools;
pub mod promise;
pub mod replication;
pub mod server;

pub use error::Error;
pub use lookup::{gen_lookup, pool_of, SeriesLookup};
pub use pool_impl::Pool;
pub use pools::Pools;
pub use promise::{PendingPromises, Promise, PromiseCallback, PromiseSet, PromiseStatus, ResponseSink, Transport};
pub use server::{Server, ServerFlags};
