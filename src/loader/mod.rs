//! Cache-Backed Loader Module
//!
//! Binds a cache, a key and an async fetcher for the lifetime of one caller.
//!
//! # Behavior
//! - `load` serves an unexpired cache hit without fetching; on a miss it
//!   fetches and stores the result
//! - `refresh` always fetches
//! - When a fetch fails, any cached value for the key (expired or not) is
//!   served with a stale flag; the error surfaces only when nothing is cached
//! - Calls on one loader are queued: a `refresh` issued while another call
//!   is in flight waits for it, then runs its own fetch
//! - There is no single-flight across loaders; two loaders on one key fetch
//!   independently and the last write wins

mod state;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::cache::{CacheHandle, CacheValue};
use crate::error::{FetchError, LoadError};

pub use state::{LoadSnapshot, LoadSource, LoadState, Loaded};

/// Type-erased fetcher shared by every call of a loader.
pub type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

// == Cache Loader ==
pub struct CacheLoader<T> {
    cache: CacheHandle<T>,
    key: String,
    fetcher: Fetcher<T>,
    active: AtomicBool,
    /// Serializes load/refresh calls
    in_flight: Mutex<()>,
    snapshots: watch::Sender<LoadSnapshot<T>>,
}

impl<T: CacheValue> CacheLoader<T> {
    // == Constructor ==
    /// Creates an idle loader. `key` must encode everything that affects
    /// what `fetcher` returns.
    pub fn new<F, Fut>(cache: CacheHandle<T>, key: impl Into<String>, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || fetcher().boxed());
        let (snapshots, _) = watch::channel(LoadSnapshot::default());
        Self {
            cache,
            key: key.into(),
            fetcher,
            active: AtomicBool::new(true),
            in_flight: Mutex::new(()),
            snapshots,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Receives every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<LoadSnapshot<T>> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> LoadSnapshot<T> {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> LoadState {
        self.snapshots.borrow().state
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    // == Load ==
    /// Activation: serve from the cache, fetching only on a miss.
    pub async fn load(&self) -> Result<Loaded<T>, LoadError> {
        self.run(false).await
    }

    // == Refresh ==
    /// Forces a fetch, skipping the cache check.
    pub async fn refresh(&self) -> Result<Loaded<T>, LoadError> {
        self.run(true).await
    }

    // == Deactivate ==
    /// Ends the subscription. A fetch already running still writes its
    /// result to the cache, but nothing more is published or returned.
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.snapshots.send_modify(|snapshot| snapshot.state = LoadState::Inactive);
            debug!(key = %self.key, "Loader deactivated");
        }
    }

    fn ensure_active(&self) -> Result<(), LoadError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(LoadError::Inactive(self.key.clone()))
        }
    }

    /// Applies `change` to the published snapshot unless the loader has
    /// been deactivated. The check runs under the channel lock, so nothing
    /// lands after the `Inactive` transition.
    fn transition(&self, change: impl FnOnce(&mut LoadSnapshot<T>)) -> Result<(), LoadError> {
        let applied = self.snapshots.send_if_modified(|snapshot| {
            if !self.is_active() {
                return false;
            }
            change(snapshot);
            true
        });
        if applied {
            Ok(())
        } else {
            Err(LoadError::Inactive(self.key.clone()))
        }
    }

    async fn run(&self, force: bool) -> Result<Loaded<T>, LoadError> {
        let _turn = self.in_flight.lock().await;
        self.transition(|snapshot| {
            snapshot.state = LoadState::Loading;
            snapshot.error = None;
        })?;

        if !force {
            if let Some(value) = self.cache.lookup(&self.key).await {
                debug!(key = %self.key, "Loader served from cache");
                return self.settle(Loaded::cached(value));
            }
        }

        debug!(key = %self.key, force, "Loader fetching");
        match (self.fetcher)().await {
            Ok(value) => {
                self.cache.set(&self.key, value.clone(), None).await;
                self.settle(Loaded::fetched(value))
            }
            Err(err) => {
                let err = FetchError::new(err);
                self.ensure_active()?;

                match self.cache.peek_any(&self.key).await {
                    Some(stale) => {
                        warn!(key = %self.key, error = %err, "Fetch failed, serving stale value");
                        self.settle(Loaded::stale(stale, err))
                    }
                    None => {
                        warn!(key = %self.key, error = %err, "Fetch failed with nothing cached");
                        self.transition(|snapshot| *snapshot = LoadSnapshot::errored(err.clone()))?;
                        Err(LoadError::Fetch(err))
                    }
                }
            }
        }
    }

    fn settle(&self, loaded: Loaded<T>) -> Result<Loaded<T>, LoadError> {
        self.transition(|snapshot| *snapshot = LoadSnapshot::settled(&loaded))?;
        Ok(loaded)
    }
}
