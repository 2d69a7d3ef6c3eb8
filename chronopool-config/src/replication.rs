use serde::{Deserialize, Serialize};

fn default_tick_ms() -> u64 {
    100
}

fn default_data_dir() -> String {
    ".".to_string()
}

fn default_init_file() -> String {
    ".replicate".to_string()
}

/// Replicator timing (spec §4.5). The 100ms figure is load-bearing: it is
/// the backpressure delay re-armed after every FIFO pop and every promise
/// response, not just an idle poll interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Replication {
    pub tick_ms: u64,
    /// Database directory the FIFO segments and init marker file live
    /// under (spec §6 persisted files).
    pub data_dir: String,
    /// File name (relative to `data_dir`) used for the initial-sync
    /// marker file (spec §4.5, §6 persisted files).
    pub init_file: String,
}

impl Default for Replication {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            data_dir: default_data_dir(),
            init_file: default_init_file(),
        }
    }
}
