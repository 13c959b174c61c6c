//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and install logging before anything else logs
//! - Initialize subsystems in dependency order
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{finalize_config, read_config, AppConfig, ConfigError};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the config file, install logging, then apply environment
/// overrides so their diagnostics are logged.
pub fn bootstrap(path: Option<&Path>) -> Result<AppConfig, StartupError> {
    let config = read_config(path)?;
    logging::init_logging(&config.observability);
    let config = finalize_config(config)?;

    tracing::info!(
        config_file = ?path,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        development_mode = config.access.development_mode,
        "Configuration loaded"
    );
    Ok(config)
}

/// Start every subsystem and serve until SIGINT/SIGTERM.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                error = %e,
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    signals::wait_for_signal().await;
    shutdown.trigger();

    match server_task.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Server task panicked"),
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
