//! Plain-text HTTP relay for the latest Dexcom Share glucose reading.
//!
//! Each `GET /` consults a refresh gate: if more than 58 seconds have
//! passed since the last successful fetch, the current reading is pulled
//! from the Share account and returned as three lines:
//!
//! ```text
//! 120
//! steady
//! 2024-01-01T00:00:00
//! ```
//!
//! Inside the window, or when the provider fails, the answer is
//! `503 No Data`. No reading is carried over between requests.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`reading`]: Reading and trend types
//! - [`provider`]: Dexcom Share client and test provider
//! - [`cache`]: Refresh gate in front of the provider
//! - [`api`]: HTTP routes
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod reading;
pub mod utils;

pub use config::Config;
pub use error::{RelayError, Result};
