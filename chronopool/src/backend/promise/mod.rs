//! Promise / PromiseSet: the inter-pool RPC fan-out primitive (spec §4.6).

pub mod pending;
pub mod promise;
pub mod promise_set;
pub mod timer;
pub mod transport;

pub use pending::PendingPromises;
pub use promise::{Promise, PromiseStatus};
pub use promise_set::{PromiseCallback, PromiseSet};
pub use transport::{ResponseSink, Transport};

#[cfg(test)]
pub use transport::test_support;
