//! Image Cache - A two-tier blob cache server
//!
//! Binary entry point: loads configuration, builds the cache manager and
//! serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_cache::api::create_router;
use image_cache::cache::{CacheManager, DurableStore, FileStore, InMemoryStore};
use image_cache::fetcher::HttpFetcher;
use image_cache::{spawn_expiry_task, AppState, Config};

/// Main entry point for the image cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the durable store, fetcher and cache manager
/// 4. Start the background expiry task when a maximum age is set
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Image Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: persistent_budget={}B, max_entries={}, memory_budget={}B, port={}",
        config.persistent_budget_bytes,
        config.max_entries,
        config.memory_budget_bytes,
        config.server_port
    );

    let store: Arc<dyn DurableStore> = match &config.cache_dir {
        Some(dir) => {
            info!("Using file store at {}", dir.display());
            Arc::new(FileStore::new(dir.clone()))
        }
        None => {
            info!("CACHE_DIR not set, using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };
    let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout))
        .context("failed to build HTTP client")?;

    let cache = CacheManager::new(config.cache_config(), store, Arc::new(fetcher)).await;
    info!(caching_enabled = cache.caching_enabled(), "Cache manager initialized");

    let expiry_handle = config.entry_max_age_secs.map(|_| {
        info!("Background expiry task started");
        spawn_expiry_task(cache.clone(), config.expiry_sweep_interval)
    });

    let app = create_router(AppState::new(cache));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(expiry_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the expiry task and allows graceful shutdown.
async fn shutdown_signal(expiry_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    if let Some(handle) = expiry_handle {
        handle.abort();
        warn!("Expiry task aborted");
    }
}
