use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;
use crate::general::General;
use crate::replication::Replication;
use crate::server::ServerConfig;
use crate::users::Users;

/// `chronopool.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub replication: Replication,
    /// Full cluster topology: every server in every pool. The local
    /// server is the one entry with `is_local = true` (spec §3, §4.2).
    pub servers: Vec<ServerConfig>,
}

impl Config {
    /// Highest pool id referenced by any server, used to size the pool set
    /// (spec §4.2: `num_pools = max_pool_id + 1`).
    pub fn max_pool_id(&self) -> Option<u16> {
        self.servers.iter().map(|s| s.pool).max()
    }

    pub fn check(&self) {
        for pool in 0..=self.max_pool_id().unwrap_or(0) {
            if !self.servers.iter().any(|s| s.pool == pool) {
                warn!("pool {} has no servers configured", pool);
            }
        }

        if !self.servers.iter().any(|s| s.is_local) {
            warn!("no server in chronopool.toml is marked `is_local = true`");
        }
    }
}

/// Combination of `chronopool.toml` and `users.toml`, along with the paths
/// they were loaded from (kept around for `reload`/`SHOW CONFIG`).
#[derive(Debug, Clone)]
pub struct ConfigAndUsers {
    pub config: Config,
    pub users: Users,
    pub config_path: PathBuf,
    pub users_path: PathBuf,
}

impl Default for ConfigAndUsers {
    fn default() -> Self {
        Self {
            config: Config::default(),
            users: Users::default(),
            config_path: PathBuf::from("chronopool.toml"),
            users_path: PathBuf::from("users.toml"),
        }
    }
}

impl ConfigAndUsers {
    pub fn load(config_path: &Path, users_path: &Path) -> Result<Self, Error> {
        let config: Config = if let Ok(contents) = read_to_string(config_path) {
            let config = toml::from_str(&contents)
                .map_err(|e| Error::Parse(config_path.to_owned(), e))?;
            info!("loaded \"{}\"", config_path.display());
            config
        } else {
            warn!(
                "\"{}\" doesn't exist, loading defaults instead",
                config_path.display()
            );
            Config::default()
        };

        config.check();

        let users: Users = if let Ok(contents) = read_to_string(users_path) {
            let users = toml::from_str(&contents)
                .map_err(|e| Error::Parse(users_path.to_owned(), e))?;
            info!("loaded \"{}\"", users_path.display());
            users
        } else {
            warn!(
                "\"{}\" doesn't exist, loading defaults instead",
                users_path.display()
            );
            Users::default()
        };

        Ok(Self {
            config,
            users,
            config_path: config_path.to_owned(),
            users_path: users_path.to_owned(),
        })
    }
}
