//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries, so keys
//! written once and never read again do not pile up.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{CacheStore, CacheValue};

/// Spawns a background task that periodically sweeps expired cache entries.
///
/// The task sleeps for `interval` between sweeps and takes the store's write
/// lock for each one, so sweeps are serialized with reads and writes. It
/// holds only a weak reference and exits once the store has been dropped.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort it.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(store));
/// let sweep_handle = spawn_sweep_task(Arc::downgrade(&store), Duration::from_secs(60));
/// // Later:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task<T: CacheValue>(
    store: Weak<RwLock<CacheStore<T>>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Starting expiry sweep with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("Cache dropped, expiry sweep exiting");
                break;
            };

            let (namespace, removed) = {
                let mut guard = store.write().await;
                let removed = guard.sweep_expired();
                (guard.namespace().to_string(), removed)
            };

            if removed > 0 {
                info!(namespace = %namespace, "Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!(namespace = %namespace, "Expiry sweep: no expired entries found");
            }
        }
    })
}
