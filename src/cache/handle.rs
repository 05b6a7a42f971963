//! Cache Handle Module
//!
//! Shared async front for a [`CacheStore`], owning its sweep task.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore, CacheValue};
use crate::error::FetchError;
use crate::tasks::spawn_sweep_task;

// == Cache Handle ==
/// Cloneable handle to one store.
///
/// All clones share the same index and the same sweep task. The store lock
/// is never held while a fetcher runs.
pub struct CacheHandle<T> {
    store: Arc<RwLock<CacheStore<T>>>,
    sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
    sweep_interval: Duration,
    namespace: Arc<str>,
}

impl<T> Clone for CacheHandle<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            sweeper: Arc::clone(&self.sweeper),
            sweep_interval: self.sweep_interval,
            namespace: Arc::clone(&self.namespace),
        }
    }
}

impl<T: CacheValue> CacheHandle<T> {
    /// Wraps a store. Sweeping is not started.
    pub fn new(store: CacheStore<T>) -> Self {
        let sweep_interval = store.config().sweep_interval;
        let namespace: Arc<str> = Arc::from(store.namespace());
        Self {
            store: Arc::new(RwLock::new(store)),
            sweeper: Arc::new(Mutex::new(None)),
            sweep_interval,
            namespace,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The shared store, for tests that need to hold its lock.
    #[cfg(test)]
    pub(crate) fn store(&self) -> &Arc<RwLock<CacheStore<T>>> {
        &self.store
    }

    // == Store Operations ==
    pub async fn get(&self, key: &str) -> Option<T> {
        self.store.write().await.get(key)
    }

    pub async fn set(&self, key: &str, value: T, ttl: Option<Duration>) {
        self.store.write().await.set(key, value, ttl);
    }

    pub async fn lookup(&self, key: &str) -> Option<T> {
        self.store.write().await.lookup(key)
    }

    pub async fn remove(&self, key: &str) {
        self.store.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.store.write().await.clear();
    }

    pub async fn size(&self) -> usize {
        self.store.write().await.size()
    }

    pub async fn is_expired(&self, key: &str) -> bool {
        self.store.read().await.is_expired(key)
    }

    pub async fn peek_any(&self, key: &str) -> Option<T> {
        self.store.read().await.peek_any(key)
    }

    pub async fn sweep_expired(&self) -> usize {
        self.store.write().await.sweep_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.keys()
    }

    // == Refresh ==
    /// Fetches a fresh value and stores it.
    ///
    /// When the fetcher fails, any value still indexed for `key` is returned
    /// instead, expired or not. The fetch error is returned only when there
    /// is nothing to fall back on.
    pub async fn refresh<F, Fut>(&self, key: &str, fetcher: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match fetcher().await {
            Ok(value) => {
                self.set(key, value.clone(), None).await;
                Ok(value)
            }
            Err(err) => {
                let err = FetchError::new(err);
                match self.peek_any(key).await {
                    Some(stale) => {
                        warn!(
                            namespace = %self.namespace,
                            key,
                            error = %err,
                            "Refresh failed, serving cached value"
                        );
                        Ok(stale)
                    }
                    None => Err(err),
                }
            }
        }
    }

    // == Sweep Lifecycle ==
    fn sweeper_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the periodic expiry sweep.
    ///
    /// Returns false when a sweep is already running or no tokio runtime is
    /// available; the store works without one either way.
    pub fn start_sweeping(&self) -> bool {
        let mut slot = self.sweeper_slot();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(
                namespace = %self.namespace,
                "No async runtime, expiry sweep not started"
            );
            return false;
        }

        *slot = Some(spawn_sweep_task(
            Arc::downgrade(&self.store),
            self.sweep_interval,
        ));
        debug!(namespace = %self.namespace, "Expiry sweep started");
        true
    }

    /// Stops the periodic expiry sweep. Returns false when none was running.
    pub fn stop_sweeping(&self) -> bool {
        match self.sweeper_slot().take() {
            Some(task) => {
                task.abort();
                debug!(namespace = %self.namespace, "Expiry sweep stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper_slot()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
