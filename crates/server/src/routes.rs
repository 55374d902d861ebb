//! Route configuration.

use crate::handlers;
use crate::metrics::{metrics_handler, register_metrics};
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Ceiling on serving a single request, dominated by the mirror HEAD probe.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Create the application router.
///
/// The registry surface is not route-shaped (method allow-list with an exact
/// error body, prefix matches, a path grammar of its own), so everything
/// except `/metrics` is dispatched by one fallback handler.
pub fn create_router(state: AppState, metrics_enabled: bool) -> Router {
    register_metrics();

    let mut router = Router::new();
    // SECURITY: when enabled, /metrics must be network-restricted to
    // authorized scrapers; see crate::metrics.
    if metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .fallback(handlers::handle)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
