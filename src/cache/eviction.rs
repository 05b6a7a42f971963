//! Eviction Module
//!
//! Picks which entries leave a store once it grows past its size bound.

use std::collections::HashMap;

use crate::cache::CacheEntry;
use crate::config::EvictionPolicy;

// == Select Victims ==
/// Returns the `excess` keys that should be evicted first under `policy`.
///
/// FIFO orders by `stored_at`, LRU by `last_accessed`. Ties fall back to the
/// insertion sequence, so the choice is deterministic.
pub fn select_victims<T>(
    entries: &HashMap<String, CacheEntry<T>>,
    policy: EvictionPolicy,
    excess: usize,
) -> Vec<String> {
    if excess == 0 {
        return Vec::new();
    }

    let mut order: Vec<(u64, u64, &String)> = entries
        .iter()
        .map(|(key, entry)| {
            let at = match policy {
                EvictionPolicy::Fifo => entry.stored_at,
                EvictionPolicy::Lru => entry.last_accessed,
            };
            (at, entry.seq, key)
        })
        .collect();
    order.sort_unstable();

    order
        .into_iter()
        .take(excess)
        .map(|(_, _, key)| key.clone())
        .collect()
}
