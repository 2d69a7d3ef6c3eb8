//! Command-line interface. Grounded on `pgdog`'s `cli.rs`: a `clap` derive
//! struct with config/users paths and a small subcommand set.

use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use chronopool_config::{Config, Users};
use clap::{Parser, Subcommand};
use thiserror::Error;

/// ChronoPool is a distributed time-series database's query and
/// replication coordinator.
#[derive(Parser, Debug)]
#[command(name = "chronopool", version)]
pub struct Cli {
    /// Path to the cluster configuration file.
    #[arg(short, long, default_value = "chronopool.toml")]
    pub config: PathBuf,

    /// Path to the users/access-control file.
    #[arg(short, long, default_value = "users.toml")]
    pub users: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Default)]
pub enum Commands {
    /// Start the coordinator.
    #[default]
    Run,
    /// Check the configuration files for errors without starting anything.
    Configcheck,
}

#[derive(Debug, Error)]
pub enum ConfigCheckError {
    #[error("I/O error on \"{0}\": {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("TOML parse error in \"{0}\": {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
}

/// Confirm that the configuration and users files are valid TOML shaped
/// the way `Config`/`Users` expect, without installing them process-wide.
pub fn config_check(config_path: &Path, users_path: &Path) -> Result<(), ConfigCheckError> {
    match read_to_string(config_path) {
        Ok(s) => {
            toml::from_str::<Config>(&s)
                .map_err(|e| ConfigCheckError::Parse(config_path.to_owned(), e))?;
        }
        Err(e) => return Err(ConfigCheckError::Io(config_path.to_owned(), e)),
    }

    match read_to_string(users_path) {
        Ok(s) => {
            toml::from_str::<Users>(&s)
                .map_err(|e| ConfigCheckError::Parse(users_path.to_owned(), e))?;
        }
        Err(e) => return Err(ConfigCheckError::Io(users_path.to_owned(), e)),
    }

    Ok(())
}
