//! Mock reading provider for unit testing.
//!
//! This module provides a provider that can be used in tests
//! without making real network requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::reading::Reading;

use super::ReadingProvider;

/// Configuration for mock provider behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether to fail every fetch.
    pub fail: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

/// Mock provider for testing.
///
/// Clones share the configured reading and the call counter.
#[derive(Debug, Clone, Default)]
pub struct MockReadingProvider {
    /// Mock configuration.
    config: Arc<Mutex<MockConfig>>,
    /// Reading returned on success.
    reading: Arc<Mutex<Reading>>,
    /// Number of fetches attempted.
    calls: Arc<AtomicU64>,
}

impl MockReadingProvider {
    /// Create a mock that returns an empty reading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that returns `reading`.
    pub fn with_reading(reading: Reading) -> Self {
        let mock = Self::new();
        mock.set_reading(reading);
        mock
    }

    /// Create a mock with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            ..Self::default()
        }
    }

    /// Set the reading returned on success.
    pub fn set_reading(&self, reading: Reading) {
        *self.reading.lock().unwrap() = reading;
    }

    /// Toggle failure mode.
    pub fn set_failing(&self, fail: bool) {
        self.config.lock().unwrap().fail = fail;
    }

    /// Number of fetches attempted so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadingProvider for MockReadingProvider {
    async fn current_reading(&self) -> Result<Reading, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let config = self.config.lock().unwrap().clone();
        if config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(config.latency_ms)).await;
        }

        if config.fail {
            return Err(ProviderError::Api {
                status: 500,
                code: "MockFailure".to_string(),
                message: "Mock provider failure".to_string(),
            });
        }

        Ok(self.reading.lock().unwrap().clone())
    }
}
