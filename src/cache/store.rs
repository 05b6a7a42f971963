//! Cache Store Module
//!
//! Main cache engine: an in-memory index with TTL expiry and a size bound,
//! mirrored best-effort into an optional storage medium.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::eviction::select_victims;
use crate::cache::persist::Persistence;
use crate::cache::{CacheEntry, CacheStats, CacheValue};
use crate::clock::Clock;
use crate::config::{Backend, CacheStoreConfig};
use crate::error::Result;
use crate::medium::StorageMedium;

// == Cache Store ==
/// One namespaced cache.
///
/// The index is the source of truth for reads. When the backend is durable
/// or session-scoped, every write is mirrored to the medium and the index is
/// rehydrated from it once, in [`CacheStore::open`].
#[derive(Debug)]
pub struct CacheStore<T> {
    config: CacheStoreConfig,
    /// Key-value storage
    entries: HashMap<String, CacheEntry<T>>,
    persistence: Persistence,
    clock: Arc<dyn Clock>,
    /// Performance statistics
    stats: CacheStats,
    next_seq: u64,
}

impl<T: CacheValue> CacheStore<T> {
    // == Constructor ==
    /// Builds a store and rehydrates it from `medium`.
    ///
    /// The medium is ignored for transient stores. A durable or
    /// session-scoped store without a medium runs memory-only.
    pub fn open(
        config: CacheStoreConfig,
        medium: Option<Arc<dyn StorageMedium>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let medium = match config.backend {
            Backend::Transient => None,
            Backend::Durable | Backend::SessionScoped => {
                if medium.is_none() {
                    info!(
                        namespace = %config.namespace,
                        backend = ?config.backend,
                        "No medium supplied, cache will be memory-only"
                    );
                }
                medium
            }
        };

        let mut store = Self {
            persistence: Persistence::new(&config.namespace, medium),
            config,
            entries: HashMap::new(),
            clock,
            stats: CacheStats::new(),
            next_seq: 0,
        };
        store.rehydrate();
        Ok(store)
    }

    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    // == Rehydrate ==
    fn rehydrate(&mut self) {
        if !self.persistence.is_attached() {
            return;
        }

        let now = self.now();
        let (mut live, purged) = self.persistence.load_all::<T>(now);
        live.sort_by(|(ka, a), (kb, b)| a.stored_at.cmp(&b.stored_at).then_with(|| ka.cmp(kb)));

        let restored = live.len();
        for (key, mut entry) in live {
            entry.seq = self.bump_seq();
            self.entries.insert(key, entry);
        }
        self.stats.record_expirations(purged);
        self.enforce_capacity();
        self.sync_stats();

        info!(
            namespace = %self.config.namespace,
            restored,
            purged,
            retained = self.entries.len(),
            "Cache rehydrated from medium"
        );
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // == Set ==
    /// Stores a value, overwriting any previous entry for `key`.
    ///
    /// `ttl` overrides the store default for this entry. After the write the
    /// oldest entries are evicted until the size bound holds again.
    pub fn set(&mut self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let key = key.into();
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        let mut entry = CacheEntry::new(value, self.now(), ttl);
        entry.seq = self.bump_seq();

        self.persistence.save(&key, &entry);
        self.entries.insert(key, entry);

        self.enforce_capacity();
        self.sync_stats();
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Expired entries are removed (index and medium) and reported as absent.
    pub fn get(&mut self, key: &str) -> Option<T> {
        let now = self.now();
        let expired = match self.entries.get_mut(key) {
            None => {
                self.stats.record_miss();
                return None;
            }
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                entry.last_accessed = now;
                false
            }
        };

        if expired {
            self.entries.remove(key);
            self.persistence.delete(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            self.sync_stats();
            return None;
        }

        self.stats.record_hit();
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    // == Lookup ==
    /// Like [`get`](Self::get), but an expired entry stays indexed so it can
    /// still back a stale fallback. Counts as a miss.
    pub fn lookup(&mut self, key: &str) -> Option<T> {
        let now = self.now();
        match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_accessed = now;
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            _ => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Peek Any ==
    /// Returns whatever is stored for `key`, expired or not, without side
    /// effects. Used as the fallback when a refresh fails.
    pub fn peek_any(&self, key: &str) -> Option<T> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Raw entry lookup, ignoring expiry.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    // == Remove ==
    /// Removes an entry by key. Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.persistence.delete(key);
        self.sync_stats();
    }

    // == Clear ==
    /// Empties the index and this namespace's part of the medium.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.persistence.clear();
        self.sync_stats();
        debug!(namespace = %self.config.namespace, "Cache cleared");
    }

    // == Is Expired ==
    /// True when `key` is absent or past its expiry.
    pub fn is_expired(&self, key: &str) -> bool {
        let now = self.now();
        self.entries
            .get(key)
            .map_or(true, |entry| entry.is_expired(now))
    }

    // == Size ==
    /// Number of live entries. Sweeps first so dead entries are never
    /// counted.
    pub fn size(&mut self) -> usize {
        self.sweep_expired();
        self.entries.len()
    }

    // == Sweep Expired ==
    /// Removes all expired entries from the index and the medium.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.now();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
            self.persistence.delete(&key);
        }

        self.stats.record_expirations(count);
        self.sync_stats();
        count
    }

    // == Enforce Capacity ==
    fn enforce_capacity(&mut self) {
        let excess = self.entries.len().saturating_sub(self.config.max_entries);
        if excess == 0 {
            return;
        }

        for key in select_victims(&self.entries, self.config.eviction, excess) {
            self.entries.remove(&key);
            self.persistence.delete(&key);
            self.stats.record_eviction();
            debug!(namespace = %self.config.namespace, key = %key, "Evicted cache entry");
        }
    }

    fn sync_stats(&mut self) {
        self.stats.set_total_entries(self.entries.len());
        self.stats.set_medium_failures(self.persistence.failures());
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats.set_medium_failures(self.persistence.failures());
        stats
    }

    // == Keys ==
    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = self.now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Entries currently indexed, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn config(&self) -> &CacheStoreConfig {
        &self.config
    }

    /// Whether writes still reach a medium.
    pub fn is_persistent(&self) -> bool {
        self.persistence.is_attached()
    }
}
