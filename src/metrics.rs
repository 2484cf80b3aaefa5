//! Prometheus metrics for the relay.
//!
//! This module provides:
//! - Provider fetch outcome counters
//! - Provider fetch latency
//! - No-data response counter

use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{RelayError, Result};

// === Metric Name Constants ===

/// Provider fetch latency metric name.
pub const METRIC_FETCH_LATENCY: &str = "provider_fetch_latency_ms";
/// Successful fetches counter metric name.
pub const METRIC_FETCHES_SUCCEEDED: &str = "provider_fetches_succeeded_total";
/// Failed fetches counter metric name.
pub const METRIC_FETCHES_FAILED: &str = "provider_fetches_failed_total";
/// Fetches skipped inside the rate-limit window.
pub const METRIC_FETCHES_SKIPPED: &str = "provider_fetches_skipped_total";
/// "No Data" responses counter metric name.
pub const METRIC_NO_DATA_RESPONSES: &str = "no_data_responses_total";

/// How often histogram buckets are drained when nobody scrapes `/metrics`.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Install the Prometheus recorder, start its upkeep task, and describe
/// all metrics. Call this once at startup, inside the runtime.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| RelayError::Metrics(e.to_string()))?;

    spawn_upkeep(handle.clone(), UPKEEP_INTERVAL);

    describe_histogram!(
        METRIC_FETCH_LATENCY,
        "Provider fetch latency in milliseconds"
    );
    describe_counter!(
        METRIC_FETCHES_SUCCEEDED,
        "Total number of successful provider fetches"
    );
    describe_counter!(
        METRIC_FETCHES_FAILED,
        "Total number of failed provider fetches"
    );
    describe_counter!(
        METRIC_FETCHES_SKIPPED,
        "Total number of requests served without a fetch because of the refresh interval"
    );
    describe_counter!(
        METRIC_NO_DATA_RESPONSES,
        "Total number of No Data responses"
    );

    debug!("Metrics initialized");
    Ok(handle)
}

/// Periodically run recorder upkeep so histogram samples do not pile up
/// between scrapes.
pub fn spawn_upkeep(handle: PrometheusHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            handle.run_upkeep();
        }
    })
}

/// Record provider fetch latency.
pub fn record_fetch_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_FETCH_LATENCY).record(latency_ms);
}

/// Increment successful fetches counter.
pub fn inc_fetches_succeeded() {
    counter!(METRIC_FETCHES_SUCCEEDED).increment(1);
}

/// Increment failed fetches counter.
pub fn inc_fetches_failed() {
    counter!(METRIC_FETCHES_FAILED).increment(1);
}

/// Increment skipped fetches counter.
pub fn inc_fetches_skipped() {
    counter!(METRIC_FETCHES_SKIPPED).increment(1);
}

/// Increment "No Data" responses counter.
pub fn inc_no_data_responses() {
    counter!(METRIC_NO_DATA_RESPONSES).increment(1);
}
