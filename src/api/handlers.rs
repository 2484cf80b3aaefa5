//! HTTP API handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::debug;

use crate::cache::ReadingCache;
use crate::metrics;
use crate::provider::ReadingProvider;

/// Body returned when no reading is available.
pub const NO_DATA_BODY: &str = "No Data";

/// Status returned alongside [`NO_DATA_BODY`].
pub const NO_DATA_STATUS: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Remote reading provider.
    pub provider: Arc<dyn ReadingProvider>,
    /// Refresh gate in front of the provider.
    pub cache: Arc<ReadingCache>,
    /// Prometheus handle, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(provider: Arc<dyn ReadingProvider>, cache: ReadingCache) -> Self {
        Self {
            provider,
            cache: Arc::new(cache),
            metrics: None,
        }
    }

    /// Attach a Prometheus handle for `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

fn plain_text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

/// Latest reading handler.
///
/// Returns `value\ntrend\ntimestamp` with 200, or "No Data" with 503 when
/// nothing was fetched. Provider failures never escape this handler.
pub async fn latest_reading(State(state): State<AppState>) -> Response {
    let outcome = state
        .cache
        .refresh(state.provider.as_ref(), Instant::now())
        .await;

    match outcome.into_reading().and_then(|r| r.to_plain_text()) {
        Some(body) => plain_text(StatusCode::OK, body),
        None => {
            debug!("Responding with no data");
            metrics::inc_no_data_responses();
            plain_text(NO_DATA_STATUS, NO_DATA_BODY)
        }
    }
}

/// Health check handler - always returns 200.
pub async fn health() -> Response {
    plain_text(StatusCode::OK, "OK")
}

/// Prometheus exposition handler - 404 when metrics are disabled.
pub async fn prometheus(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => plain_text(StatusCode::OK, handle.render()),
        None => plain_text(StatusCode::NOT_FOUND, "metrics disabled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockReadingProvider;
    use std::time::Duration;

    #[tokio::test]
    async fn app_state_starts_without_metrics() {
        let state = AppState::new(
            Arc::new(MockReadingProvider::new()),
            ReadingCache::new(Duration::from_secs(1)),
        );
        assert!(state.metrics.is_none());
        assert_eq!(state.cache.last_fetch_time().await, None);
    }
}
