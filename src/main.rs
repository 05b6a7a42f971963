//! Content Cache daemon
//!
//! Opens every preset cache over the durable medium, keeps their expiry
//! sweeps running and reports statistics until shut down.

use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use content_cache::{CacheHandle, CacheRegistry, Config, Preset};

/// Main entry point for the cache daemon.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the durable medium and build every preset store
/// 4. Log statistics periodically
/// 5. Stop sweeps on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "content_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting content cache");

    let config = Config::from_env();
    info!(
        "Configuration loaded: data_dir={}, sweep_interval={}s, auto_sweep={}, stats_interval={}s",
        config.data_dir.display(),
        config.sweep_interval,
        config.auto_sweep,
        config.stats_interval
    );

    let registry = CacheRegistry::from_config(&config).context("failed to open cache medium")?;

    let mut caches: Vec<(Preset, CacheHandle<Value>)> = Vec::new();
    for preset in Preset::ALL {
        let handle = registry
            .preset(preset)
            .with_context(|| format!("failed to build {} cache", preset))?;
        let entries = handle.size().await;
        info!(cache = %preset, entries, "Cache ready");
        caches.push((preset, handle));
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.stats_interval));
    ticker.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for (preset, handle) in &caches {
                    let stats = handle.stats().await;
                    info!(
                        cache = %preset,
                        entries = stats.total_entries,
                        hit_rate = stats.hit_rate(),
                        evictions = stats.evictions,
                        expirations = stats.expirations,
                        medium_failures = stats.medium_failures,
                        "Cache stats"
                    );
                }
            }
            _ = &mut shutdown => break,
        }
    }

    for (_, handle) in &caches {
        handle.stop_sweeping();
    }
    warn!("Expiry sweeps stopped");
    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
