//! HTTP API route definitions.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health, latest_reading, prometheus, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Reading endpoint
        .route("/", get(latest_reading))
        // Health endpoint
        .route("/health", get(health))
        // Metrics endpoint
        .route("/metrics", get(prometheus))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
