//! Storage Medium Module
//!
//! Key-value contract for the copy of a store's entries that lives outside
//! the in-memory index, plus the on-medium record format.
//!
//! Keys are written as `"{namespace}_cache_{key}"` and values as JSON
//! `{"value": ..., "storedAt": <ms>, "expiresAt": <ms>}`.

mod file;
mod memory;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::MediumError;

pub use file::FileMedium;
pub use memory::MemoryMedium;

// == Storage Medium ==
/// A string key-value medium shared by any number of namespaces.
pub trait StorageMedium: Send + Sync + Debug {
    /// Reads a raw value, `None` when the key is absent.
    fn read(&self, key: &str) -> Result<Option<String>, MediumError>;

    /// Writes or overwrites a raw value.
    fn write(&self, key: &str, value: &str) -> Result<(), MediumError>;

    /// Deletes a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), MediumError>;

    /// Lists every key starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, MediumError>;
}

// == Stored Record ==
/// The persisted form of one cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord<T> {
    pub value: T,
    /// Epoch milliseconds
    pub stored_at: u64,
    /// Epoch milliseconds
    pub expires_at: u64,
}

// == Key Helpers ==
/// Joins a namespace to its cache keys. Namespaces may not contain it, so no
/// namespace prefix can cover another namespace's keys.
pub const KEY_SEPARATOR: &str = "_cache_";

/// Prefix shared by every medium key of `namespace`.
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{}{}", namespace, KEY_SEPARATOR)
}

/// Medium key for `key` inside `namespace`.
pub fn medium_key(namespace: &str, key: &str) -> String {
    format!("{}{}", namespace_prefix(namespace), key)
}
