//! Persistence Module
//!
//! Namespaced access to a store's storage medium. Every medium call goes
//! through [`Persistence::guard`], which absorbs failures: they are logged,
//! counted, and the caller carries on with its in-memory state.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::CacheEntry;
use crate::error::MediumError;
use crate::medium::{medium_key, namespace_prefix, StorageMedium, StoredRecord};

// == Persistence ==
#[derive(Debug)]
pub(crate) struct Persistence {
    namespace: String,
    prefix: String,
    medium: Option<Arc<dyn StorageMedium>>,
    failures: u64,
}

impl Persistence {
    pub fn new(namespace: &str, medium: Option<Arc<dyn StorageMedium>>) -> Self {
        Self {
            namespace: namespace.to_string(),
            prefix: namespace_prefix(namespace),
            medium,
            failures: 0,
        }
    }

    /// Whether a medium is still attached.
    pub fn is_attached(&self) -> bool {
        self.medium.is_some()
    }

    /// Medium operations that failed so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    // == Guard ==
    /// Runs `op` against the medium, turning any failure into `None`.
    ///
    /// An `Unavailable` error detaches the medium for the rest of the
    /// store's life.
    fn guard<R>(
        &mut self,
        action: &str,
        op: impl FnOnce(&dyn StorageMedium) -> Result<R, MediumError>,
    ) -> Option<R> {
        let medium = Arc::clone(self.medium.as_ref()?);
        match op(medium.as_ref()) {
            Ok(result) => Some(result),
            Err(err) => {
                self.failures += 1;
                warn!(
                    namespace = %self.namespace,
                    action,
                    error = %err,
                    "Cache medium operation failed, continuing in memory"
                );
                if matches!(err, MediumError::Unavailable(_)) {
                    warn!(
                        namespace = %self.namespace,
                        "Cache medium unavailable, detaching for the rest of the process"
                    );
                    self.medium = None;
                }
                None
            }
        }
    }

    // == Save ==
    /// Writes `entry` under the namespaced form of `key`.
    pub fn save<T: Serialize>(&mut self, key: &str, entry: &CacheEntry<T>) {
        let medium_key = medium_key(&self.namespace, key);
        self.guard("write", |medium| {
            let json = serde_json::to_string(&entry.to_record())?;
            medium.write(&medium_key, &json)
        });
    }

    // == Delete ==
    pub fn delete(&mut self, key: &str) {
        let medium_key = medium_key(&self.namespace, key);
        self.guard("delete", |medium| medium.delete(&medium_key));
    }

    // == Clear ==
    /// Deletes every key of this namespace, leaving other namespaces alone.
    pub fn clear(&mut self) {
        let prefix = self.prefix.clone();
        if let Some(removed) = self.guard("clear", |medium| {
            let keys = medium.keys_with_prefix(&prefix)?;
            for key in &keys {
                medium.delete(key)?;
            }
            Ok(keys.len())
        }) {
            debug!(namespace = %self.namespace, removed, "Cleared namespace from medium");
        }
    }

    // == Load All ==
    /// Reads back every live record of this namespace.
    ///
    /// Expired records are deleted from the medium as they are found and
    /// undecodable ones are skipped. Returns the live entries keyed by cache
    /// key plus the number of expired records purged.
    pub fn load_all<T: DeserializeOwned>(&mut self, now: u64) -> (Vec<(String, CacheEntry<T>)>, usize) {
        let prefix = self.prefix.clone();
        let Some(medium_keys) = self.guard("enumerate", |medium| medium.keys_with_prefix(&prefix))
        else {
            return (Vec::new(), 0);
        };

        let mut live = Vec::with_capacity(medium_keys.len());
        let mut purged = 0;
        for medium_key in medium_keys {
            let Some(key) = medium_key.strip_prefix(&prefix).map(str::to_string) else {
                continue;
            };

            let record = self.guard("decode", |medium| {
                let raw = medium.read(&medium_key)?;
                Ok(match raw {
                    Some(raw) => Some(serde_json::from_str::<StoredRecord<T>>(&raw)?),
                    None => None,
                })
            });

            match record {
                Some(Some(record)) if now >= record.expires_at => {
                    self.delete(&key);
                    purged += 1;
                }
                Some(Some(record)) => live.push((key, CacheEntry::from_record(record))),
                _ => {}
            }
        }
        (live, purged)
    }
}
