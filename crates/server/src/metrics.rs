//! Prometheus metrics for the Waypost redirect server.
//!
//! The front-end observes the final status of every request but never
//! changes behavior based on it.
//!
//! **Deployment requirement**: when enabled, `/metrics` must be
//! network-restricted to authorized Prometheus scrapers at the
//! infrastructure level; it is intentionally unauthenticated.

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::{LazyLock, Once};

/// Registry for all redirect-server metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Served requests by final status, method, and classified client location.
pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("waypost_requests_total", "Processed requests"),
        &["code", "method", "cloud", "region"],
    )
    .expect("metric creation failed")
});

/// Requests currently being served.
pub static ACTIVE_REQUESTS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("waypost_active_requests", "Requests currently in flight")
        .expect("metric creation failed")
});

/// Regional-mirror existence answers by outcome (`exists`, `absent`).
pub static BLOB_PROBES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("waypost_blob_probes_total", "Blob existence probes"),
        &["outcome"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the registry.
///
/// Idempotent, so tests embedding multiple routers stay safe.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACTIVE_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BLOB_PROBES.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
