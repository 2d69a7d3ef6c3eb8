use serde::{Deserialize, Serialize};

fn default_limit() -> u32 {
    1000
}

fn default_where_depth() -> u32 {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_promise_timeout_ms() -> u64 {
    5_000
}

/// Settings with no natural home elsewhere: log verbosity and the two
/// bounds the dispatch layer enforces (spec §4.3 limit propagation, and
/// the where-expression depth edge case from spec §7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct General {
    pub log_level: String,
    /// Default `LIMIT` applied to `list` statements that don't specify one.
    pub default_limit: u32,
    /// Maximum nesting depth accepted for a compiled `WHERE` expression
    /// (`CExpr` tree, spec §4.3); deeper trees fail with `QueryError`.
    pub where_depth_limit: u32,
    /// How long a fan-out promise waits before resolving `TimeoutError`
    /// (spec §4.6).
    pub promise_timeout_ms: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_limit: default_limit(),
            where_depth_limit: default_where_depth(),
            promise_timeout_ms: default_promise_timeout_ms(),
        }
    }
}
