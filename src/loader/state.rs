//! Loader state and the values a loader hands back.

use crate::error::FetchError;

// == Load State ==
/// Where a loader is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Never activated
    #[default]
    Idle,
    /// A cache check or fetch is running
    Loading,
    /// Serving a fresh value
    Ready,
    /// Serving a cached value because the last fetch failed
    ReadyStale,
    /// The last fetch failed and nothing was cached
    Errored,
    /// Deactivated by its owner; terminal
    Inactive,
}

// == Load Source ==
/// Where a loaded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Unexpired cache hit, no fetch made
    Cache,
    /// Fresh from the fetcher
    Fetcher,
    /// Cached fallback after a failed fetch, possibly expired
    StaleFallback,
}

// == Loaded ==
/// A value returned by a loader.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub source: LoadSource,
    /// The fetch failure that forced a stale fallback
    pub warning: Option<FetchError>,
}

impl<T> Loaded<T> {
    pub(crate) fn cached(value: T) -> Self {
        Self {
            value,
            source: LoadSource::Cache,
            warning: None,
        }
    }

    pub(crate) fn fetched(value: T) -> Self {
        Self {
            value,
            source: LoadSource::Fetcher,
            warning: None,
        }
    }

    pub(crate) fn stale(value: T, warning: FetchError) -> Self {
        Self {
            value,
            source: LoadSource::StaleFallback,
            warning: Some(warning),
        }
    }

    /// True when the value was served in place of a failed fetch.
    pub fn is_stale(&self) -> bool {
        self.source == LoadSource::StaleFallback
    }
}

// == Load Snapshot ==
/// What subscribers of a loader observe after each transition.
#[derive(Debug, Clone)]
pub struct LoadSnapshot<T> {
    pub state: LoadState,
    pub value: Option<T>,
    /// Set while `value` is a stale fallback
    pub stale: bool,
    pub error: Option<FetchError>,
}

impl<T> Default for LoadSnapshot<T> {
    fn default() -> Self {
        Self {
            state: LoadState::Idle,
            value: None,
            stale: false,
            error: None,
        }
    }
}

impl<T: Clone> LoadSnapshot<T> {
    pub(crate) fn settled(loaded: &Loaded<T>) -> Self {
        Self {
            state: if loaded.is_stale() {
                LoadState::ReadyStale
            } else {
                LoadState::Ready
            },
            value: Some(loaded.value.clone()),
            stale: loaded.is_stale(),
            error: loaded.warning.clone(),
        }
    }

    pub(crate) fn errored(error: FetchError) -> Self {
        Self {
            state: LoadState::Errored,
            value: None,
            stale: false,
            error: Some(error),
        }
    }
}
