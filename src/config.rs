//! Configuration Module
//!
//! Handles loading and managing cache and server configuration from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// == Cache Config ==
/// Budgets and limits for the two cache tiers.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum total bytes held by the durable store
    pub persistent_budget_bytes: u64,
    /// Maximum number of entries held by the durable store
    pub max_entries: usize,
    /// Maximum total bytes held by the memory tier
    pub memory_budget_bytes: u64,
    /// Optional age after which a durable entry is treated as absent
    pub entry_max_age: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            persistent_budget_bytes: 50 * 1024 * 1024,
            max_entries: 1000,
            memory_budget_bytes: 16 * 1024 * 1024,
            entry_max_age: None,
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum total bytes held by the durable store
    pub persistent_budget_bytes: u64,
    /// Maximum number of durable entries
    pub max_entries: usize,
    /// Maximum total bytes held in memory
    pub memory_budget_bytes: u64,
    /// Entry max age in seconds, None = unbounded
    pub entry_max_age_secs: Option<u64>,
    /// Directory for the file-backed store, None = in-memory store
    pub cache_dir: Option<PathBuf>,
    /// HTTP server port
    pub server_port: u16,
    /// Upstream fetch timeout in seconds
    pub fetch_timeout: u64,
    /// Expiry sweep interval in seconds
    pub expiry_sweep_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `PERSISTENT_BUDGET_BYTES` - Durable store byte budget (default: 50 MiB)
    /// - `MAX_ENTRIES` - Maximum durable entries (default: 1000)
    /// - `MEMORY_BUDGET_BYTES` - Memory tier byte budget (default: 16 MiB)
    /// - `ENTRY_MAX_AGE_SECS` - Entry max age in seconds (default: unbounded)
    /// - `CACHE_DIR` - Directory for durable blobs (default: in-memory store)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `FETCH_TIMEOUT_SECS` - Upstream request timeout (default: 30)
    /// - `EXPIRY_SWEEP_INTERVAL` - Expiry sweep frequency in seconds (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            persistent_budget_bytes: parse_env("PERSISTENT_BUDGET_BYTES")
                .unwrap_or(defaults.persistent_budget_bytes),
            max_entries: parse_env("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            memory_budget_bytes: parse_env("MEMORY_BUDGET_BYTES")
                .unwrap_or(defaults.memory_budget_bytes),
            entry_max_age_secs: parse_env("ENTRY_MAX_AGE_SECS"),
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            fetch_timeout: parse_env("FETCH_TIMEOUT_SECS").unwrap_or(defaults.fetch_timeout),
            expiry_sweep_interval: parse_env("EXPIRY_SWEEP_INTERVAL")
                .unwrap_or(defaults.expiry_sweep_interval),
        }
    }

    /// Projects the engine settings out of the server configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            persistent_budget_bytes: self.persistent_budget_bytes,
            max_entries: self.max_entries,
            memory_budget_bytes: self.memory_budget_bytes,
            entry_max_age: self.entry_max_age_secs.map(Duration::from_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let cache = CacheConfig::default();
        Self {
            persistent_budget_bytes: cache.persistent_budget_bytes,
            max_entries: cache.max_entries,
            memory_budget_bytes: cache.memory_budget_bytes,
            entry_max_age_secs: None,
            cache_dir: None,
            server_port: 3000,
            fetch_timeout: 30,
            expiry_sweep_interval: 60,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
