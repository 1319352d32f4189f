//! Mini Cache - cache status server
//!
//! Serves the statistics of an application-scoped cache registry while a
//! background service sweeps expired entries.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_cache::api::create_router;
use mini_cache::{AppState, CacheRegistry, CleanupManager, CleanupOptions, Config, StoreOptions};

/// Main entry point for the cache status server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the registry and the default cache
/// 4. Start background TTL cleanup
/// 5. Serve the status endpoints until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini Cache status server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_ttl={}ms, cleanup_interval={}ms, response_time_window={}, port={}",
        config.cache_ttl_ms, config.cleanup_interval_ms, config.response_time_window, config.server_port
    );

    let registry = Arc::new(CacheRegistry::new());
    let default_cache = registry.create_cache_with_window::<serde_json::Value>(
        "default",
        StoreOptions::new(config.cache_ttl()),
        config.response_time_window,
    );

    let cleanup = CleanupManager::new();
    cleanup.add(
        "default",
        default_cache,
        CleanupOptions::new(config.cleanup_interval())
            .on_cleanup(|cleaned, size| {
                if cleaned > 0 {
                    info!(cleaned, size, "Expired entries removed");
                } else {
                    debug!(size, "Cleanup found nothing to remove");
                }
            })
            .on_error(|err| warn!(error = %err, "Cleanup cycle failed")),
    );
    cleanup.start_all();

    let app = create_router(AppState::new(registry));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cleanup.stop_all();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
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
