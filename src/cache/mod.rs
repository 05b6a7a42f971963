//! Cache Module
//!
//! Provides typed in-memory caching with TTL expiration, FIFO eviction and
//! optional mirroring into a storage medium.

mod entry;
mod eviction;
mod handle;
mod persist;
mod stats;
mod store;


use serde::de::DeserializeOwned;
use serde::Serialize;

// Re-export public types
pub use entry::CacheEntry;
pub use handle::CacheHandle;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Cache Value ==
/// Bound for anything a cache can hold: cloneable out of the index,
/// serializable into a medium, and shareable with the sweep task.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}
