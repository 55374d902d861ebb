//! Waypost redirect server binary.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waypost_core::{RegistryConfig, ServerConfig};
use waypost_server::{AppState, CachedBlobChecker, create_router};

/// How long in-flight connections get to drain after a shutdown signal.
const SHUTDOWN_DRAIN_WINDOW: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("failed to load configuration")?;
    let registry_config =
        RegistryConfig::from_server_config(&config).context("invalid registry configuration")?;
    tracing::info!(
        us = %registry_config.upstream_us.endpoint,
        eu = %registry_config.upstream_eu.endpoint,
        asia = %registry_config.upstream_asia.endpoint,
        azure = %registry_config.upstream_azure.endpoint,
        cdn = %registry_config.upstream_cdn.endpoint,
        "upstreams configured"
    );

    let state = AppState::new(registry_config, Arc::new(CachedBlobChecker::new()));
    let app = create_router(state, config.metrics_enabled);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "listening");

    // the drain timer starts only once the shutdown signal has fired, so a
    // stuck client can delay exit by at most the drain window
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(());
    });

    tokio::select! {
        result = serve => result?,
        _ = async {
            let _ = shutdown_rx.await;
            tokio::time::sleep(SHUTDOWN_DRAIN_WINDOW).await;
        } => {
            tracing::warn!(window = ?SHUTDOWN_DRAIN_WINDOW, "drain window expired, exiting with connections open");
        }
    }

    tracing::info!("server exited");
    Ok(())
}

/// Resolve when the process is asked to stop.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install SIGINT handler");
        }
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => tracing::error!(%error, "failed to install SIGTERM handler"),
        }
    };
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
