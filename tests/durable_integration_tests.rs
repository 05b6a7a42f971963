//! Integration Tests for Durable Stores
//!
//! Builds stores through the registry over a file medium and checks what
//! survives a rebuild, namespace isolation and fail-open behavior.

use std::sync::Arc;
use std::time::Duration;

use content_cache::clock::ManualClock;
use content_cache::medium::{FileMedium, StorageMedium};
use content_cache::{
    Backend, CacheHandle, CacheLoader, CacheRegistry, CacheStoreConfig, MediumError, Preset,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Equipment {
    id: u32,
    name: String,
    daily_rate: f64,
}

fn excavator() -> Equipment {
    Equipment {
        id: 1,
        name: "Mini excavator".to_string(),
        daily_rate: 180.0,
    }
}

fn open_registry(dir: &std::path::Path, clock: &ManualClock) -> (CacheRegistry, Arc<FileMedium>) {
    let medium = Arc::new(FileMedium::open(dir).unwrap());
    let registry = CacheRegistry::new(medium.clone())
        .with_clock(Arc::new(clock.clone()))
        .with_auto_sweep(false);
    (registry, medium)
}

#[derive(Debug)]
struct BrokenMedium;

impl StorageMedium for BrokenMedium {
    fn read(&self, _key: &str) -> Result<Option<String>, MediumError> {
        Err(MediumError::Unavailable("disk detached".to_string()))
    }
    fn write(&self, _key: &str, _value: &str) -> Result<(), MediumError> {
        Err(MediumError::Unavailable("disk detached".to_string()))
    }
    fn delete(&self, _key: &str) -> Result<(), MediumError> {
        Err(MediumError::Unavailable("disk detached".to_string()))
    }
    fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, MediumError> {
        Err(MediumError::Unavailable("disk detached".to_string()))
    }
}

#[tokio::test]
async fn test_entries_survive_restart_before_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_000);
    {
        let (registry, _) = open_registry(dir.path(), &clock);
        let cache: CacheHandle<Equipment> = registry.preset(Preset::Equipment).unwrap();
        cache.set("equipment:1", excavator(), None).await;
    }

    clock.advance(Duration::from_secs(60));
    let (registry, _) = open_registry(dir.path(), &clock);
    let cache: CacheHandle<Equipment> = registry.preset(Preset::Equipment).unwrap();

    assert_eq!(cache.get("equipment:1").await, Some(excavator()));
}

#[tokio::test]
async fn test_expired_entries_purged_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    {
        let (registry, _) = open_registry(dir.path(), &clock);
        let cache: CacheHandle<Equipment> = registry.preset(Preset::Equipment).unwrap();
        cache.set("equipment:1", excavator(), Some(Duration::from_secs(5))).await;
    }

    clock.set(5_000);
    let (registry, medium) = open_registry(dir.path(), &clock);
    let cache: CacheHandle<Equipment> = registry.preset(Preset::Equipment).unwrap();

    assert_eq!(cache.get("equipment:1").await, None);
    assert!(medium.keys_with_prefix("equipment_cache_").unwrap().is_empty());
}

#[tokio::test]
async fn test_record_format_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(2_000);
    let (registry, medium) = open_registry(dir.path(), &clock);
    let cache: CacheHandle<u32> = registry
        .build(CacheStoreConfig::new(
            "articles",
            Duration::from_millis(500),
            10,
            Backend::Durable,
        ))
        .unwrap();

    cache.set("latest", 9, None).await;

    let raw = medium.read("articles_cache_latest").unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["value"], 9);
    assert_eq!(json["storedAt"], 2_000);
    assert_eq!(json["expiresAt"], 2_500);
}

#[tokio::test]
async fn test_clear_leaves_other_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    let (registry, medium) = open_registry(dir.path(), &clock);
    let equipment: CacheHandle<u32> = registry.preset(Preset::Equipment).unwrap();
    let articles: CacheHandle<u32> = registry.preset(Preset::Articles).unwrap();

    equipment.set("a", 1, None).await;
    equipment.set("b", 2, None).await;
    articles.set("a", 3, None).await;
    equipment.clear().await;

    assert_eq!(equipment.size().await, 0);
    assert!(medium.keys_with_prefix("equipment_cache_").unwrap().is_empty());
    assert_eq!(
        medium.keys_with_prefix("articles_cache_").unwrap(),
        vec!["articles_cache_a".to_string()]
    );
    assert_eq!(articles.get("a").await, Some(3));
}

#[tokio::test]
async fn test_eviction_scenario_on_durable_store() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    let (registry, medium) = open_registry(dir.path(), &clock);
    let cache: CacheHandle<u32> = registry
        .build(CacheStoreConfig::new(
            "search",
            Duration::from_millis(1000),
            2,
            Backend::Durable,
        ))
        .unwrap();

    cache.set("a", 1, None).await;
    clock.set(10);
    cache.set("b", 2, None).await;
    clock.set(20);
    cache.set("c", 3, None).await;

    assert_eq!(cache.size().await, 2);
    assert_eq!(cache.get("a").await, None);
    assert_eq!(cache.get("b").await, Some(2));
    assert_eq!(cache.get("c").await, Some(3));
    assert_eq!(medium.read("search_cache_a").unwrap(), None, "Eviction reaches the medium");

    clock.set(1015);
    assert_eq!(cache.get("b").await, None);
    assert_eq!(cache.size().await, 1);
    assert_eq!(medium.read("search_cache_b").unwrap(), None);
}

#[tokio::test]
async fn test_broken_medium_degrades_to_memory_only() {
    let clock = ManualClock::new(0);
    let registry = CacheRegistry::new(Arc::new(BrokenMedium))
        .with_clock(Arc::new(clock.clone()))
        .with_auto_sweep(false);

    let cache: CacheHandle<u32> = registry.preset(Preset::Images).unwrap();
    cache.set("img:1", 1, None).await;
    cache.remove("img:2").await;
    cache.clear().await;
    cache.set("img:3", 3, None).await;

    assert_eq!(cache.get("img:3").await, Some(3));
    let stats = cache.stats().await;
    assert_eq!(
        stats.medium_failures, 1,
        "Unavailable medium is dropped after the first failure"
    );
}

#[tokio::test]
async fn test_loader_stale_fallback_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    {
        let (registry, _) = open_registry(dir.path(), &clock);
        let cache: CacheHandle<Equipment> = registry.preset(Preset::Equipment).unwrap();
        let loader = CacheLoader::new(cache, "equipment:1", || async { Ok(excavator()) });
        loader.load().await.unwrap();
    }

    clock.advance(Duration::from_secs(30));
    let (registry, _) = open_registry(dir.path(), &clock);
    let cache: CacheHandle<Equipment> = registry.preset(Preset::Equipment).unwrap();
    let loader = CacheLoader::new(cache, "equipment:1", || async {
        Err::<Equipment, _>(anyhow::anyhow!("database offline"))
    });

    let loaded = loader.refresh().await.unwrap();
    assert_eq!(loaded.value, excavator());
    assert!(loaded.is_stale());
}
