//! Link Audit - link health auditing service
//!
//! Starts the maintenance driver and the HTTP trigger/status API.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use link_audit::api::create_router;
use link_audit::tasks::{load_snapshot, save_snapshot, spawn_maintenance_driver, MaintenanceTasks};
use link_audit::{AppContext, Config};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Build the application context
/// 4. Restore the cache snapshot, if configured
/// 5. Start the maintenance driver and refresh worker
/// 6. Serve the API until SIGINT/SIGTERM
/// 7. Save the cache snapshot
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to info, can be overridden with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "link_audit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Link Audit service");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        "Configuration loaded: port={}, max_memory={}MB, batch_size={}, max_concurrent_audits={}",
        config.server.server_port,
        config.cache.max_memory_mb,
        config.validator.batch_size,
        config.scheduler.max_concurrent_audits
    );

    let port = config.server.server_port;
    let snapshot_path = config.server.snapshot_path.clone();
    let ctx = AppContext::from_config(config).context("failed to build application context")?;

    if let Some(path) = &snapshot_path {
        if let Err(e) = load_snapshot(&ctx.cache, path).await {
            warn!("Ignoring unreadable cache snapshot: {}", e);
        }
    }

    let tasks = spawn_maintenance_driver(ctx.clone());
    info!("Maintenance driver and refresh worker started");

    let app = create_router(ctx.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await
        .context("server error")?;

    if let Some(path) = &snapshot_path {
        if let Err(e) = save_snapshot(&ctx.cache, path).await {
            error!("Failed to save cache snapshot: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then stops the background loops.
async fn shutdown_signal(tasks: MaintenanceTasks) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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

    tasks.abort();
    warn!("Maintenance driver and refresh worker aborted");
}
