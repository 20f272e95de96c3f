//! Resume Cache - a multi-tier caching proxy with offline delivery
//!
//! Sits in front of the resume site's origin server, answering page, asset
//! and content requests from versioned cache partitions and cache tiers.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resume_cache::{create_router, spawn_cleanup_task, warm_critical_content, AppState, Config};

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create cache tiers, content resolver and worker registration
/// 4. Register the worker for the configured cache version
/// 5. Start the background maintenance task
/// 6. Warm the critical content sections
/// 7. Serve until SIGINT/SIGTERM, then close the persistent tier
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resume_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume Cache proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, default_ttl={}s, port={}, cleanup_interval={}s, version={}",
        config.max_entries,
        config.default_ttl,
        config.server_port,
        config.cleanup_interval,
        config.cache_version
    );

    let state = AppState::from_config(&config).context("failed to build application state")?;

    if let Some(persistent) = &state.persistent {
        match persistent.init().await {
            Ok(()) => info!("Persistent cache ready"),
            // Reads and writes retry the open, so keep serving from memory
            Err(err) => warn!("Persistent cache unavailable: {}", err),
        }
    }

    let worker = state
        .worker(&config.cache_version)
        .context("failed to configure offline worker")?;
    match state.registration.register(worker).await {
        Ok(worker_state) => info!(
            "Worker {} registered ({:?})",
            config.cache_version, worker_state
        ),
        Err(err) => warn!(
            "Worker {} failed to install, serving as a plain proxy: {}",
            config.cache_version, err
        ),
    }

    let cleanup_handle = spawn_cleanup_task(
        state.memory.clone(),
        state.persistent.clone(),
        config.cleanup_interval,
    );
    info!("Background maintenance task started");

    let report = warm_critical_content(&state.resolver, &config.warm_sections).await;
    if !report.is_complete() {
        warn!("Sections not warmed: {:?}", report.failed);
    }

    let persistent = state.persistent.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    if let Some(persistent) = persistent {
        persistent.close().await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the maintenance task and allows graceful shutdown.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
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
                warn!("Failed to install SIGTERM handler: {}", err);
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

    cleanup_handle.abort();
    warn!("Maintenance task aborted");
}
