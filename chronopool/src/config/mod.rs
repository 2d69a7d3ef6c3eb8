//! Process-wide configuration accessor.
//!
//! Grounded on `pgdog::config::config()`: an `ArcSwap` behind a
//! `once_cell::sync::Lazy`, loaded once at startup and swappable on
//! `reload` without restarting the process. This is the concrete instance
//! of the "global mutable singletons" design note (spec §9) — tests build
//! an isolated `ConfigAndUsers` and call `set` directly instead of relying
//! on the ambient process state.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chronopool_config::{ConfigAndUsers, Error};
use once_cell::sync::Lazy;

static CONFIG: Lazy<ArcSwap<ConfigAndUsers>> =
    Lazy::new(|| ArcSwap::from_pointee(ConfigAndUsers::default()));

/// Current configuration snapshot.
pub fn config() -> Arc<ConfigAndUsers> {
    CONFIG.load().clone()
}

/// Load configuration from disk and install it process-wide.
pub fn load(config_path: &PathBuf, users_path: &PathBuf) -> Result<Arc<ConfigAndUsers>, Error> {
    let loaded = ConfigAndUsers::load(config_path, users_path)?;
    Ok(set(loaded))
}

/// Install an already-constructed configuration, e.g. after `RELOAD` or in
/// tests.
pub fn set(config: ConfigAndUsers) -> Arc<ConfigAndUsers> {
    let arc = Arc::new(config);
    CONFIG.store(arc.clone());
    arc
}

#[cfg(test)]
pub fn load_test() -> Arc<ConfigAndUsers> {
    use chronopool_config::{Config, ServerConfig};
    use uuid::Uuid;

    let config = Config {
        servers: vec![ServerConfig {
            uuid: Uuid::nil(),
            name: "local".into(),
            pool: 0,
            host: "127.0.0.1".into(),
            port: 9_000,
            is_local: true,
        }],
        ..Default::default()
    };

    set(ConfigAndUsers {
        config,
        ..ConfigAndUsers::default()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn load_test_installs_a_local_server() {
        let config = load_test();
        assert!(config.config.servers.iter().any(|s| s.is_local));
    }

    #[test]
    fn set_then_config_round_trips() {
        let loaded = load_test();
        let current = config();
        assert_eq!(loaded.config, current.config);
    }
}
