//! Remote reading provider.
//!
//! This module handles:
//! - The `ReadingProvider` seam used by the cache
//! - Dexcom Share API client
//! - A stand-in provider for when the real client cannot be built
//! - Mock provider for testing

pub mod dexcom;
pub mod mock;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::reading::Reading;

pub use dexcom::DexcomClient;
pub use mock::{MockConfig, MockReadingProvider};

/// Source of the current glucose reading.
#[async_trait]
pub trait ReadingProvider: Send + Sync {
    /// Fetch the current reading from the remote account.
    async fn current_reading(&self) -> Result<Reading, ProviderError>;
}

/// Provider used when the real client failed to construct.
///
/// Every fetch fails with the construction error, so the relay keeps
/// serving `/health` and answers `/` with "No Data".
#[derive(Debug, Clone)]
pub struct UnavailableProvider {
    reason: String,
}

impl UnavailableProvider {
    /// Create a provider that always fails with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReadingProvider for UnavailableProvider {
    async fn current_reading(&self) -> Result<Reading, ProviderError> {
        Err(ProviderError::Unavailable(self.reason.clone()))
    }
}
