//! Configuration Module
//!
//! Per-store configuration (`CacheStoreConfig`) and process-level settings
//! loaded from environment variables (`Config`).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};
use crate::medium::KEY_SEPARATOR;

/// Interval between expiry sweeps when none is configured.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// == Backend ==
/// Where a store keeps the copy of its entries that outlives the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Memory only
    Transient,
    /// Survives process restarts
    Durable,
    /// Shared for the lifetime of the session medium
    SessionScoped,
}

// == Eviction Policy ==
/// Ordering used to pick victims once a store exceeds `max_entries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Oldest `stored_at` first
    #[default]
    Fifo,
    /// Least recently read first
    Lru,
}

// == Cache Store Config ==
/// Parameters for one namespaced cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStoreConfig {
    /// Prefix partitioning this store's keys inside a shared medium
    pub namespace: String,
    /// TTL applied when `set` gets no override
    pub default_ttl: Duration,
    /// Size bound enforced after every write
    pub max_entries: usize,
    pub backend: Backend,
    pub eviction: EvictionPolicy,
    /// Time between expiry sweeps
    pub sweep_interval: Duration,
    /// Start the sweep task as soon as the store is built
    pub auto_sweep: bool,
}

impl CacheStoreConfig {
    // == Constructor ==
    /// Creates a FIFO config that sweeps every minute.
    pub fn new(
        namespace: impl Into<String>,
        default_ttl: Duration,
        max_entries: usize,
        backend: Backend,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            default_ttl,
            max_entries,
            backend,
            eviction: EvictionPolicy::Fifo,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            auto_sweep: true,
        }
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_auto_sweep(mut self, auto_sweep: bool) -> Self {
        self.auto_sweep = auto_sweep;
        self
    }

    // == Validate ==
    /// Rejects configurations that would break the entry invariants.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(CacheError::InvalidConfig(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.namespace.contains(KEY_SEPARATOR) {
            return Err(CacheError::InvalidConfig(format!(
                "namespace '{}' must not contain '{}'",
                self.namespace, KEY_SEPARATOR
            )));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(format!(
                "default TTL for '{}' must be positive",
                self.namespace
            )));
        }
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "max entries for '{}' must be positive",
                self.namespace
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(format!(
                "sweep interval for '{}' must be positive",
                self.namespace
            )));
        }
        Ok(())
    }
}

// == Process Config ==
/// Process configuration for the cache daemon.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the durable medium
    pub data_dir: PathBuf,
    /// Expiry sweep interval in seconds, applied to every preset
    pub sweep_interval: u64,
    /// Start sweeping when a store is built
    pub auto_sweep: bool,
    /// Interval in seconds between statistics log lines
    pub stats_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DATA_DIR` - Durable medium directory (default: .content-cache)
    /// - `CACHE_SWEEP_INTERVAL` - Sweep interval in seconds (default: 60)
    /// - `CACHE_AUTO_SWEEP` - Start sweeping at construction (default: true)
    /// - `CACHE_STATS_INTERVAL` - Stats log interval in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("CACHE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.sweep_interval),
            auto_sweep: env::var("CACHE_AUTO_SWEEP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_sweep),
            stats_interval: env::var("CACHE_STATS_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.stats_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".content-cache"),
            sweep_interval: DEFAULT_SWEEP_INTERVAL.as_secs(),
            auto_sweep: true,
            stats_interval: 30,
        }
    }
}
