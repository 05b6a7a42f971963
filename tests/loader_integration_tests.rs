//! Integration Tests for the Cache-Backed Loader
//!
//! Covers the stale-fallback protocol, call ordering on one loader, and
//! behavior across several loaders sharing a cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use content_cache::clock::ManualClock;
use content_cache::loader::LoadSource;
use content_cache::{
    Backend, CacheHandle, CacheLoader, CacheStore, CacheStoreConfig, LoadError, LoadState,
};
use tokio::sync::Semaphore;

// == Helper Functions ==

fn create_cache(clock: &ManualClock) -> CacheHandle<u32> {
    let config = CacheStoreConfig::new(
        "equipment",
        Duration::from_millis(1000),
        10,
        Backend::Transient,
    );
    CacheHandle::new(CacheStore::open(config, None, Arc::new(clock.clone())).unwrap())
}

/// A loader whose fetches each wait for one permit on `gate` and return
/// their call number.
fn gated_loader(
    cache: CacheHandle<u32>,
    calls: Arc<AtomicUsize>,
    gate: Arc<Semaphore>,
) -> Arc<CacheLoader<u32>> {
    Arc::new(CacheLoader::new(cache, "equipment:list", move || {
        let calls = calls.clone();
        let gate = gate.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
            gate.acquire().await?.forget();
            Ok::<_, anyhow::Error>(n)
        }
    }))
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// == Stale Fallback ==

#[tokio::test]
async fn test_stale_value_served_after_expiry_when_fetch_fails() {
    let clock = ManualClock::new(0);
    let cache = create_cache(&clock);
    let healthy = Arc::new(std::sync::atomic::AtomicBool::new(true));

    let loader = {
        let healthy = healthy.clone();
        CacheLoader::new(cache.clone(), "article:42", move || {
            let healthy = healthy.clone();
            async move {
                if healthy.load(Ordering::SeqCst) {
                    Ok(42)
                } else {
                    Err(anyhow::anyhow!("service unreachable"))
                }
            }
        })
    };

    let first = loader.load().await.unwrap();
    assert_eq!(first.value, 42);
    assert!(!first.is_stale());

    clock.set(10_000);
    healthy.store(false, Ordering::SeqCst);

    let second = loader.load().await.unwrap();
    assert_eq!(second.value, 42);
    assert!(second.is_stale());
    assert_eq!(second.source, LoadSource::StaleFallback);
    assert_eq!(
        second.warning.unwrap().to_string(),
        "Fetch failed: service unreachable"
    );
    assert_eq!(loader.state(), LoadState::ReadyStale);
}

#[tokio::test]
async fn test_no_fallback_surfaces_error_and_no_value() {
    let clock = ManualClock::new(0);
    let loader = CacheLoader::new(create_cache(&clock), "estimate:7", || async {
        Err::<u32, _>(anyhow::anyhow!("not found"))
    });
    let mut rx = loader.subscribe();

    let err = loader.load().await.unwrap_err();

    assert!(matches!(err, LoadError::Fetch(_)));
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.state, LoadState::Errored);
    assert!(seen.value.is_none());
    assert!(seen.error.is_some());
}

#[tokio::test]
async fn test_recovers_from_errored_on_refresh() {
    let clock = ManualClock::new(0);
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = {
        let calls = calls.clone();
        CacheLoader::new(create_cache(&clock), "user:me", move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(anyhow::anyhow!("cold start"))
                } else {
                    Ok(5)
                }
            }
        })
    };

    assert!(loader.load().await.is_err());
    assert_eq!(loader.state(), LoadState::Errored);

    let loaded = loader.refresh().await.unwrap();
    assert_eq!(loaded.value, 5);
    assert_eq!(loader.state(), LoadState::Ready);
    assert!(loader.snapshot().error.is_none());
}

// == Ordering ==

#[tokio::test]
async fn test_refresh_while_in_flight_is_queued() {
    let clock = ManualClock::new(0);
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));
    let loader = gated_loader(create_cache(&clock), calls.clone(), gate.clone());

    let first = tokio::spawn({
        let loader = loader.clone();
        async move { loader.refresh().await }
    });
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(loader.state(), LoadState::Loading);

    let second = tokio::spawn({
        let loader = loader.clone();
        async move { loader.refresh().await }
    });
    settle().await;
    assert_eq!(
        calls.load(Ordering::SeqCst),
        1,
        "Second refresh must wait for the first"
    );

    gate.add_permits(1);
    assert_eq!(first.await.unwrap().unwrap().value, 1);

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    gate.add_permits(1);
    assert_eq!(second.await.unwrap().unwrap().value, 2);
    assert_eq!(loader.snapshot().value, Some(2));
}

#[tokio::test]
async fn test_queued_load_after_refresh_hits_cache() {
    let clock = ManualClock::new(0);
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));
    let loader = gated_loader(create_cache(&clock), calls.clone(), gate.clone());

    let refresh = tokio::spawn({
        let loader = loader.clone();
        async move { loader.refresh().await }
    });
    settle().await;
    let load = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load().await }
    });

    gate.add_permits(1);
    assert_eq!(refresh.await.unwrap().unwrap().value, 1);

    let loaded = load.await.unwrap().unwrap();
    assert_eq!(loaded.value, 1);
    assert_eq!(loaded.source, LoadSource::Cache);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// == Deactivation ==

#[tokio::test]
async fn test_deactivation_discards_in_flight_result() {
    let clock = ManualClock::new(0);
    let cache = create_cache(&clock);
    let gate = Arc::new(Semaphore::new(0));
    let loader = gated_loader(cache.clone(), Arc::default(), gate.clone());
    let mut rx = loader.subscribe();

    let pending = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load().await }
    });
    settle().await;

    loader.deactivate();
    gate.add_permits(1);

    assert!(matches!(
        pending.await.unwrap(),
        Err(LoadError::Inactive(_))
    ));
    assert_eq!(rx.borrow_and_update().state, LoadState::Inactive);
    assert!(loader.snapshot().value.is_none());
    // The fetched value still lands in the shared cache
    assert_eq!(cache.get("equipment:list").await, Some(1));
}

// == Several Loaders ==

#[tokio::test]
async fn test_loaders_on_same_key_do_not_coalesce() {
    let clock = ManualClock::new(0);
    let cache = create_cache(&clock);
    let calls = Arc::new(AtomicUsize::new(0));

    let make = |cache: CacheHandle<u32>| {
        let calls = calls.clone();
        CacheLoader::new(cache, "search:q=drill", move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(n * 100)
            }
        })
    };
    let a = make(cache.clone());
    let b = make(cache.clone());

    let (ra, rb) = tokio::join!(a.load(), b.load());

    assert_eq!(calls.load(Ordering::SeqCst), 2, "Each loader fetches on its own");
    let (va, vb) = (ra.unwrap().value, rb.unwrap().value);
    assert_ne!(va, vb);
    let stored = cache.get("search:q=drill").await.unwrap();
    assert!(stored == va || stored == vb, "Store holds whichever write landed last");
}

#[tokio::test]
async fn test_loader_hit_after_other_loader_filled_cache() {
    let clock = ManualClock::new(0);
    let cache = create_cache(&clock);
    let filler = CacheLoader::new(cache.clone(), "categories", || async { Ok(3) });
    let reader = CacheLoader::new(cache.clone(), "categories", || async {
        Err::<u32, _>(anyhow::anyhow!("must not be called"))
    });

    filler.load().await.unwrap();
    let loaded = reader.load().await.unwrap();

    assert_eq!(loaded.value, 3);
    assert_eq!(loaded.source, LoadSource::Cache);
}
