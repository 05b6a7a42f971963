//! Content Cache - typed TTL caching for a content front end
//!
//! Provides namespaced caches with TTL expiration, FIFO eviction, durable or
//! session-scoped mirroring, periodic expiry sweeps, and a loader that serves
//! stale data when a fetch fails.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod loader;
pub mod medium;
pub mod registry;
pub mod tasks;

pub use cache::{CacheHandle, CacheStore, CacheValue};
pub use config::{Backend, CacheStoreConfig, Config, EvictionPolicy};
pub use error::{CacheError, FetchError, LoadError, MediumError};
pub use loader::{CacheLoader, LoadState, Loaded};
pub use registry::{CacheRegistry, Preset};
