//! Read-through gate in front of the reading provider.
//!
//! Only the time of the last successful fetch is kept. Requests inside
//! the refresh interval do not reach the provider and get no reading.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::ProviderError;
use crate::metrics;
use crate::provider::ReadingProvider;
use crate::reading::Reading;

/// Minimum interval between provider fetches.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(58);

/// True if a fetch is due: never fetched, or strictly more than
/// `min_interval` has passed since `last_fetch_time`.
pub fn should_refresh(now: Instant, last_fetch_time: Option<Instant>, min_interval: Duration) -> bool {
    match last_fetch_time {
        Some(last) => now.saturating_duration_since(last) > min_interval,
        None => true,
    }
}

/// Result of a refresh attempt.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Provider returned a reading.
    Fetched(Reading),
    /// Refresh interval has not elapsed; the provider was not called.
    Skipped {
        /// Time since the last successful fetch.
        elapsed: Duration,
    },
    /// Provider call failed or timed out.
    Failed(ProviderError),
}

impl FetchOutcome {
    /// The fetched reading, if any.
    pub fn into_reading(self) -> Option<Reading> {
        match self {
            FetchOutcome::Fetched(reading) => Some(reading),
            FetchOutcome::Skipped { .. } | FetchOutcome::Failed(_) => None,
        }
    }
}

/// Last-fetch bookkeeping, only reachable through the cache's lock.
#[derive(Debug, Default)]
struct FetchClock {
    last_fetch_time: Option<Instant>,
}

impl FetchClock {
    fn record_fetch(&mut self, now: Instant) {
        self.last_fetch_time = Some(now);
    }
}

/// Rate-limiting cache for the current reading.
#[derive(Debug)]
pub struct ReadingCache {
    clock: Mutex<FetchClock>,
    min_interval: Duration,
    fetch_timeout: Duration,
}

impl ReadingCache {
    /// Create a cache with the standard refresh interval.
    pub fn new(fetch_timeout: Duration) -> Self {
        Self::with_interval(MIN_REFRESH_INTERVAL, fetch_timeout)
    }

    /// Create a cache with an explicit refresh interval.
    pub fn with_interval(min_interval: Duration, fetch_timeout: Duration) -> Self {
        Self {
            clock: Mutex::new(FetchClock::default()),
            min_interval,
            fetch_timeout,
        }
    }

    /// Time of the last successful fetch.
    pub async fn last_fetch_time(&self) -> Option<Instant> {
        self.clock.lock().await.last_fetch_time
    }

    /// Whether a request at `now` would reach the provider.
    pub async fn should_refresh(&self, now: Instant) -> bool {
        should_refresh(now, self.clock.lock().await.last_fetch_time, self.min_interval)
    }

    /// Mark a successful fetch at `now`.
    pub async fn record_fetch(&self, now: Instant) {
        self.clock.lock().await.record_fetch(now);
    }

    /// Fetch from `provider` if the refresh interval has elapsed.
    ///
    /// The lock is held across the provider call, so concurrent requests
    /// never produce more than one fetch per interval. The timestamp only
    /// advances on success; a failure is retried by the next request.
    pub async fn refresh<P>(&self, provider: &P, now: Instant) -> FetchOutcome
    where
        P: ReadingProvider + ?Sized,
    {
        let mut clock = self.clock.lock().await;

        if !should_refresh(now, clock.last_fetch_time, self.min_interval) {
            let elapsed = clock
                .last_fetch_time
                .map(|last| now.saturating_duration_since(last))
                .unwrap_or_default();
            info!(
                elapsed_seconds = elapsed.as_secs(),
                "Refresh interval not elapsed, skipping fetch"
            );
            metrics::inc_fetches_skipped();
            return FetchOutcome::Skipped { elapsed };
        }

        let start = Instant::now();
        let result = tokio::time::timeout(self.fetch_timeout, provider.current_reading()).await;
        metrics::record_fetch_latency(start);

        match result {
            Ok(Ok(reading)) => {
                clock.record_fetch(now);
                metrics::inc_fetches_succeeded();
                debug!(?reading, "Fetched reading");
                FetchOutcome::Fetched(reading)
            }
            Ok(Err(e)) => {
                error!("Reading fetch failed: {}", e);
                metrics::inc_fetches_failed();
                FetchOutcome::Failed(e)
            }
            Err(_) => {
                let e = ProviderError::Timeout {
                    timeout_ms: self.fetch_timeout.as_millis() as u64,
                };
                error!("Reading fetch failed: {}", e);
                metrics::inc_fetches_failed();
                FetchOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockConfig, MockReadingProvider};
    use std::sync::Arc;

    fn reading() -> Reading {
        Reading {
            value: Some(120),
            trend: Some("Flat".to_string()),
            timestamp: None,
        }
    }

    #[test]
    fn should_refresh_when_never_fetched() {
        assert!(should_refresh(Instant::now(), None, MIN_REFRESH_INTERVAL));
    }

    #[test]
    fn should_refresh_is_strictly_greater_than_interval() {
        let last = Instant::now();
        assert!(!should_refresh(last + Duration::from_secs(30), Some(last), MIN_REFRESH_INTERVAL));
        assert!(!should_refresh(last + MIN_REFRESH_INTERVAL, Some(last), MIN_REFRESH_INTERVAL));
        assert!(should_refresh(
            last + MIN_REFRESH_INTERVAL + Duration::from_millis(1),
            Some(last),
            MIN_REFRESH_INTERVAL
        ));
    }

    #[test]
    fn should_refresh_tolerates_clock_going_backwards() {
        let last = Instant::now() + Duration::from_secs(10);
        assert!(!should_refresh(Instant::now(), Some(last), MIN_REFRESH_INTERVAL));
    }

    #[tokio::test]
    async fn first_request_fetches_and_records() {
        let cache = ReadingCache::new(Duration::from_secs(1));
        let provider = MockReadingProvider::with_reading(reading());
        let now = Instant::now();

        let outcome = cache.refresh(&provider, now).await;

        assert!(matches!(outcome, FetchOutcome::Fetched(ref r) if r.value == Some(120)));
        assert_eq!(provider.calls(), 1);
        assert_eq!(cache.last_fetch_time().await, Some(now));
    }

    #[tokio::test]
    async fn requests_inside_window_skip_provider() {
        let cache = ReadingCache::new(Duration::from_secs(1));
        let provider = MockReadingProvider::with_reading(reading());
        let t0 = Instant::now();

        cache.refresh(&provider, t0).await;
        let outcome = cache.refresh(&provider, t0 + Duration::from_secs(58)).await;

        assert!(matches!(outcome, FetchOutcome::Skipped { elapsed } if elapsed == Duration::from_secs(58)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn request_after_window_fetches_again() {
        let cache = ReadingCache::new(Duration::from_secs(1));
        let provider = MockReadingProvider::with_reading(reading());
        let t0 = Instant::now();

        cache.refresh(&provider, t0).await;
        let later = t0 + Duration::from_secs(59);
        let outcome = cache.refresh(&provider, later).await;

        assert!(matches!(outcome, FetchOutcome::Fetched(_)));
        assert_eq!(provider.calls(), 2);
        assert_eq!(cache.last_fetch_time().await, Some(later));
    }

    #[tokio::test]
    async fn failure_does_not_advance_timestamp() {
        let cache = ReadingCache::new(Duration::from_secs(1));
        let provider = MockReadingProvider::with_config(MockConfig {
            fail: true,
            latency_ms: 0,
        });
        let t0 = Instant::now();

        let outcome = cache.refresh(&provider, t0).await;
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(cache.last_fetch_time().await, None);

        provider.set_failing(false);
        let outcome = cache.refresh(&provider, t0 + Duration::from_secs(1)).await;
        assert!(matches!(outcome, FetchOutcome::Fetched(_)));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_failure() {
        let cache = ReadingCache::new(Duration::from_millis(20));
        let provider = MockReadingProvider::with_config(MockConfig {
            fail: false,
            latency_ms: 500,
        });

        let outcome = cache.refresh(&provider, Instant::now()).await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failed(ProviderError::Timeout { timeout_ms: 20 })
        ));
        assert_eq!(cache.last_fetch_time().await, None);
    }

    #[tokio::test]
    async fn concurrent_requests_fetch_once() {
        let cache = Arc::new(ReadingCache::new(Duration::from_secs(1)));
        let provider = MockReadingProvider::with_config(MockConfig {
            fail: false,
            latency_ms: 20,
        });
        provider.set_reading(reading());
        let now = Instant::now();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let provider = provider.clone();
                tokio::spawn(async move { cache.refresh(&provider, now).await })
            })
            .collect();

        let mut fetched = 0;
        for task in tasks {
            if let FetchOutcome::Fetched(_) = task.await.unwrap() {
                fetched += 1;
            }
        }

        assert_eq!(fetched, 1);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn record_fetch_gates_next_refresh() {
        let cache = ReadingCache::new(Duration::from_secs(1));
        let now = Instant::now();

        assert!(cache.should_refresh(now).await);
        cache.record_fetch(now).await;
        assert!(!cache.should_refresh(now + Duration::from_secs(10)).await);
        assert!(cache.should_refresh(now + Duration::from_secs(60)).await);
    }

    #[test]
    fn only_fetched_outcome_carries_reading() {
        assert!(FetchOutcome::Fetched(reading()).into_reading().is_some());
        assert!(FetchOutcome::Skipped { elapsed: Duration::ZERO }
            .into_reading()
            .is_none());
        assert!(FetchOutcome::Failed(ProviderError::NoReadings)
            .into_reading()
            .is_none());
    }
}
