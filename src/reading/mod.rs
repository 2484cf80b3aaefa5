//! Glucose reading model.

pub mod types;

pub use types::{Reading, Trend, TIMESTAMP_FORMAT};
