//! Error types for the content cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Medium Error ==
/// Failure reported by a storage medium.
///
/// These never escape a cache store: the store logs them and degrades to
/// memory-only behavior for the affected operation.
#[derive(Error, Debug)]
pub enum MediumError {
    /// Underlying I/O failed
    #[error("Medium I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("Serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The medium refused the write because it is full
    #[error("Medium quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The medium is gone for good; the store stops using it
    #[error("Medium unavailable: {0}")]
    Unavailable(String),
}

// == Fetch Error ==
/// The caller-supplied fetcher failed.
///
/// Cloneable so the same failure can be returned to the caller and published
/// to loader subscribers.
#[derive(Error, Debug, Clone)]
#[error("Fetch failed: {cause}")]
pub struct FetchError {
    cause: Arc<anyhow::Error>,
}

impl FetchError {
    /// Wraps any error returned by a fetcher.
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self {
            cause: Arc::new(err.into()),
        }
    }

    /// The underlying fetcher error.
    pub fn inner(&self) -> &anyhow::Error {
        &self.cause
    }
}

impl From<anyhow::Error> for FetchError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(err)
    }
}

// == Load Error ==
/// Errors surfaced by a cache-backed loader.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    /// The fetch failed and no cached value existed to fall back on
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The loader was deactivated by its owner
    #[error("Loader for key '{0}' is inactive")]
    Inactive(String),
}

// == Cache Error ==
/// Errors raised while building caches. Operations on a built store do not
/// fail.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Store configuration rejected
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// A medium could not be created
    #[error(transparent)]
    Medium(#[from] MediumError),
}

// == Result Type Alias ==
/// Convenience Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
