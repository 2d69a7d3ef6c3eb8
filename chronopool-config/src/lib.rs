//! Configuration types for the cluster: topology, general settings,
//! replication timing and users/access control.
//!
//! This crate holds plain, serde-deserializable data. Loading from disk,
//! the process-wide accessor and hot-reload live in `chronopool::config`.

pub mod access;
pub mod core;
pub mod error;
pub mod general;
pub mod replication;
pub mod server;
pub mod users;

pub use access::Access;
pub use core::{Config, ConfigAndUsers};
pub use error::Error;
pub use general::General;
pub use replication::Replication;
pub use server::ServerConfig;
pub use users::{User, Users};
