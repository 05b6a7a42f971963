//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of a
//! cache.
//!
//! # Tasks
//! - Expiry sweep: Removes expired cache entries at a configured interval

mod sweep;

pub use sweep::spawn_sweep_task;
