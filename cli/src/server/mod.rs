//! HTTP scanning service.

mod error;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use scannerfy_core::net::is_port_in_use;
use scannerfy_core::ConfigStore;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub use routes::router;

pub async fn run(store: &ConfigStore, app_url: Option<String>) -> Result<()> {
    let mut config = store.load().await?;
    if app_url.is_some() {
        config.app_url = app_url;
    }

    let bind_address = config.bind_address()?;
    let port = config.port()?;

    info!("Welcome to Scannerfy! The scanning service runs on port {}.", port);
    info!("Keep the application open while scanning.");

    if is_port_in_use(port) {
        error!(port, "Port {} is already in use by another application", port);
    }

    let service = Arc::new(crate::commands::build_service(&config)?);

    if config.worker.prestart {
        match service.ensure_backend_ready().await {
            Ok(()) => info!("Scan worker started ahead of first request"),
            // Not fatal: the next request retries the launch.
            Err(e) => warn!(error = %e, "Scan worker failed to prestart"),
        }
    }

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!(address = %bind_address, "Listening");

    axum::serve(listener, router(service)).await?;
    Ok(())
}
