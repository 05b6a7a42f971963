//! Registry Module
//!
//! Factory that turns a [`CacheStoreConfig`] into a ready [`CacheHandle`],
//! plus the table of named presets used by the content front end.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{CacheHandle, CacheStore, CacheValue};
use crate::clock::{Clock, SystemClock};
use crate::config::{Backend, CacheStoreConfig, Config};
use crate::error::Result;
use crate::medium::{FileMedium, MemoryMedium, StorageMedium};

// == Preset ==
/// Named cache parameterizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Equipment,
    User,
    Images,
    Search,
    Categories,
    Articles,
    Estimates,
}

struct PresetRow {
    namespace: &'static str,
    ttl_secs: u64,
    max_entries: usize,
    backend: Backend,
}

/// Rows are in `Preset` declaration order.
static PRESETS: [PresetRow; 7] = [
    PresetRow {
        namespace: "equipment",
        ttl_secs: 10 * 60,
        max_entries: 200,
        backend: Backend::Durable,
    },
    PresetRow {
        namespace: "user",
        ttl_secs: 30 * 60,
        max_entries: 50,
        backend: Backend::SessionScoped,
    },
    PresetRow {
        namespace: "images",
        ttl_secs: 60 * 60,
        max_entries: 500,
        backend: Backend::Durable,
    },
    PresetRow {
        namespace: "search",
        ttl_secs: 5 * 60,
        max_entries: 100,
        backend: Backend::Transient,
    },
    PresetRow {
        namespace: "categories",
        ttl_secs: 60 * 60,
        max_entries: 50,
        backend: Backend::Durable,
    },
    PresetRow {
        namespace: "articles",
        ttl_secs: 15 * 60,
        max_entries: 100,
        backend: Backend::Durable,
    },
    PresetRow {
        namespace: "estimates",
        ttl_secs: 5 * 60,
        max_entries: 50,
        backend: Backend::SessionScoped,
    },
];

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Equipment,
        Preset::User,
        Preset::Images,
        Preset::Search,
        Preset::Categories,
        Preset::Articles,
        Preset::Estimates,
    ];

    fn row(self) -> &'static PresetRow {
        &PRESETS[self as usize]
    }

    pub fn namespace(self) -> &'static str {
        self.row().namespace
    }

    /// The store configuration for this preset.
    pub fn config(self) -> CacheStoreConfig {
        let row = self.row();
        CacheStoreConfig::new(
            row.namespace,
            Duration::from_secs(row.ttl_secs),
            row.max_entries,
            row.backend,
        )
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// Every preset with its configuration.
pub fn preset_table() -> Vec<(Preset, CacheStoreConfig)> {
    Preset::ALL
        .iter()
        .map(|preset| (*preset, preset.config()))
        .collect()
}

// == Cache Registry ==
/// Builds stores over a shared durable medium and a shared session medium.
///
/// Each call to [`CacheRegistry::build`] returns a fresh store; callers keep
/// the handle for as long as they need the cache.
#[derive(Debug)]
pub struct CacheRegistry {
    durable: Option<Arc<dyn StorageMedium>>,
    session: Arc<dyn StorageMedium>,
    clock: Arc<dyn Clock>,
    sweep_interval: Option<Duration>,
    auto_sweep: Option<bool>,
    opened: Mutex<HashSet<String>>,
}

impl CacheRegistry {
    /// A registry over `durable`, with a fresh session medium and the wall
    /// clock.
    pub fn new(durable: Arc<dyn StorageMedium>) -> Self {
        Self {
            durable: Some(durable),
            session: Arc::new(MemoryMedium::new()),
            clock: Arc::new(SystemClock),
            sweep_interval: None,
            auto_sweep: None,
            opened: Mutex::new(HashSet::new()),
        }
    }

    /// A registry without durable storage; durable stores run memory-only.
    pub fn in_memory() -> Self {
        Self {
            durable: None,
            ..Self::new(Arc::new(MemoryMedium::new()))
        }
    }

    /// A registry over a file medium in `config.data_dir`, with the
    /// configured sweep settings applied to every store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let medium = FileMedium::open(&config.data_dir)?;
        info!("Durable cache medium at {}", config.data_dir.display());
        Ok(Self::new(Arc::new(medium))
            .with_sweep_interval(Duration::from_secs(config.sweep_interval))
            .with_auto_sweep(config.auto_sweep))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_session_medium(mut self, session: Arc<dyn StorageMedium>) -> Self {
        self.session = session;
        self
    }

    /// Overrides every built store's sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Overrides every built store's auto-sweep flag.
    pub fn with_auto_sweep(mut self, auto_sweep: bool) -> Self {
        self.auto_sweep = Some(auto_sweep);
        self
    }

    /// The medium a store with `backend` is built over.
    pub fn medium_for(&self, backend: Backend) -> Option<Arc<dyn StorageMedium>> {
        match backend {
            Backend::Transient => None,
            Backend::Durable => self.durable.clone(),
            Backend::SessionScoped => Some(Arc::clone(&self.session)),
        }
    }

    // == Build ==
    /// Builds a store for `config`, rehydrating it and starting its sweep
    /// when auto-sweep is on.
    pub fn build<T: CacheValue>(&self, mut config: CacheStoreConfig) -> Result<CacheHandle<T>> {
        if let Some(interval) = self.sweep_interval {
            config.sweep_interval = interval;
        }
        if let Some(auto_sweep) = self.auto_sweep {
            config.auto_sweep = auto_sweep;
        }

        let fresh = self
            .opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.namespace.clone());
        if !fresh {
            warn!(
                namespace = %config.namespace,
                "Namespace opened more than once; stores will not see each other's writes"
            );
        }

        let medium = self.medium_for(config.backend);
        let auto_sweep = config.auto_sweep;
        let handle = CacheHandle::new(CacheStore::open(config, medium, Arc::clone(&self.clock))?);
        if auto_sweep {
            handle.start_sweeping();
        }
        Ok(handle)
    }

    pub fn preset<T: CacheValue>(&self, preset: Preset) -> Result<CacheHandle<T>> {
        self.build(preset.config())
    }
}
