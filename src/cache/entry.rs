//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use crate::medium::StoredRecord;

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The stored value
    pub value: T,
    /// Creation timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Expiration timestamp (Unix milliseconds), always after `stored_at`
    pub expires_at: u64,
    /// Last successful read (Unix milliseconds), memory only
    pub last_accessed: u64,
    /// Insertion sequence, breaks `stored_at` ties
    pub(crate) seq: u64,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry stored at `now` that lives for `ttl`.
    ///
    /// A zero TTL is stretched to one millisecond so the entry still has a
    /// valid lifetime.
    pub fn new(value: T, now: u64, ttl: Duration) -> Self {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        Self {
            value,
            stored_at: now,
            expires_at: now.saturating_add(ttl_ms),
            last_accessed: now,
            seq: 0,
        }
    }

    /// Rebuilds an entry from its persisted record.
    pub fn from_record(record: StoredRecord<T>) -> Self {
        Self {
            value: record.value,
            stored_at: record.stored_at,
            expires_at: record.expires_at,
            last_accessed: record.stored_at,
            seq: 0,
        }
    }

    /// Borrowing view of this entry in its persisted shape.
    pub fn to_record(&self) -> StoredRecord<&T> {
        StoredRecord {
            value: &self.value,
            stored_at: self.stored_at,
            expires_at: self.expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now >= expires_at`, so it is gone the moment
    /// its TTL has fully elapsed.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Remaining lifetime in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }
}
