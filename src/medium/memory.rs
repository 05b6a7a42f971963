//! In-process medium backed by an ordered map.
//!
//! Lives as long as the process. Used for session-scoped stores and as a
//! shared stand-in for durable storage when several stores are rebuilt over
//! the same medium.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::StorageMedium;
use crate::error::MediumError;

#[derive(Debug, Default)]
struct Contents {
    entries: BTreeMap<String, String>,
    /// Sum of key and value lengths currently held
    bytes: usize,
}

/// Map-backed medium with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    contents: Mutex<Contents>,
    quota_bytes: Option<usize>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a medium that refuses writes once keys plus values exceed
    /// `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            contents: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of keys held, across all namespaces.
    pub fn len(&self) -> usize {
        self.contents.lock().map(|c| c.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Contents>, MediumError> {
        self.contents
            .lock()
            .map_err(|_| MediumError::Unavailable("memory medium lock poisoned".to_string()))
    }
}

impl StorageMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<String>, MediumError> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), MediumError> {
        let mut contents = self.lock()?;
        let previous = contents
            .entries
            .get(key)
            .map(|old| key.len() + old.len())
            .unwrap_or(0);
        let projected = contents.bytes - previous + key.len() + value.len();

        if let Some(quota) = self.quota_bytes {
            if projected > quota {
                return Err(MediumError::QuotaExceeded(format!(
                    "writing '{}' needs {} bytes, quota is {}",
                    key, projected, quota
                )));
            }
        }

        contents.entries.insert(key.to_string(), value.to_string());
        contents.bytes = projected;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), MediumError> {
        let mut contents = self.lock()?;
        if let Some(old) = contents.entries.remove(key) {
            contents.bytes -= key.len() + old.len();
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, MediumError> {
        Ok(self
            .lock()?
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
