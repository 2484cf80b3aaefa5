//! Unified error types for the glucose relay.

use thiserror::Error;

/// Unified error type for the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Metrics recorder could not be installed.
    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Errors raised while talking to the CGM provider.
///
/// The HTTP handler never surfaces these to callers; every variant
/// collapses into the same "No Data" response.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// A required credential was not configured.
    #[error("missing credential: {0} is not set")]
    MissingCredentials(&'static str),

    /// The account rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The Share session is no longer valid.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// The account has no reading in the requested window.
    #[error("no glucose readings available")]
    NoReadings,

    /// The provider did not answer within the fetch timeout.
    #[error("provider timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The provider client could not be constructed.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Share API returned an error payload.
    #[error("share api error (HTTP {status}): {code}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Share error code.
        code: String,
        /// Share error message.
        message: String,
    },

    /// Failed to parse a Share response.
    #[error("failed to parse share response: {0}")]
    Parse(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, RelayError>;
