//! # BookOn API Server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load config ─► connect PostgreSQL ─► migrate ─► connect Redis (opt.)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  axum::serve(0.0.0.0:8080) ─► ctrl-c / SIGTERM ─► graceful shutdown     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bookon_api::cache::UnreadCache;
use bookon_api::{router, ApiConfig, AppState};
use bookon_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bookon=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting BookOn API server...");

    let config = ApiConfig::load().context("loading configuration")?;
    info!(
        environment = %config.environment,
        address = %config.bind_address(),
        "Configuration loaded"
    );

    let db = Database::new(
        DbConfig::new(&config.database_url)
            .max_connections(config.database_max_connections)
            .tfc_settings(config.tfc_settings()),
    )
    .await
    .context("connecting to PostgreSQL")?;
    info!("Connected to PostgreSQL");

    // Redis is optional: unread counts fall back to PostgreSQL
    let cache = match &config.redis_url {
        Some(url) => match UnreadCache::connect(url).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, continuing without it");
                None
            }
        },
        None => None,
    };

    let address = config.bind_address();
    let state = Arc::new(AppState::new(db.clone(), cache, config));

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!(%address, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
