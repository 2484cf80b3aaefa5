//! Glucose reading types.

use chrono::{DateTime, FixedOffset};
use strum::{Display, EnumString};

/// Timestamp layout used in the plain-text response.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// mg/dL to mmol/L conversion factor.
const MMOL_L_CONVERSION_FACTOR: f64 = 0.0555;

/// Dexcom trend direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Default)]
pub enum Trend {
    /// No trend reported.
    #[default]
    #[strum(serialize = "None")]
    NoTrend,
    /// Rising quickly.
    DoubleUp,
    /// Rising.
    SingleUp,
    /// Rising slightly.
    FortyFiveUp,
    /// Steady.
    Flat,
    /// Falling slightly.
    FortyFiveDown,
    /// Falling.
    SingleDown,
    /// Falling quickly.
    DoubleDown,
    /// Unable to determine trend.
    NotComputable,
    /// Trend unavailable.
    RateOutOfRange,
}

impl Trend {
    const ALL: [Trend; 10] = [
        Trend::NoTrend,
        Trend::DoubleUp,
        Trend::SingleUp,
        Trend::FortyFiveUp,
        Trend::Flat,
        Trend::FortyFiveDown,
        Trend::SingleDown,
        Trend::DoubleDown,
        Trend::NotComputable,
        Trend::RateOutOfRange,
    ];

    /// Look up a trend by its numeric Share index.
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Trend::NoTrend => "",
            Trend::DoubleUp => "rising quickly",
            Trend::SingleUp => "rising",
            Trend::FortyFiveUp => "rising slightly",
            Trend::Flat => "steady",
            Trend::FortyFiveDown => "falling slightly",
            Trend::SingleDown => "falling",
            Trend::DoubleDown => "falling quickly",
            Trend::NotComputable => "unable to determine trend",
            Trend::RateOutOfRange => "trend unavailable",
        }
    }
}

/// Most recent glucose reading.
///
/// Every field is optional: the provider may return a record with any of
/// them missing, and the relay renders each one independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    /// Glucose value in mg/dL.
    pub value: Option<u32>,
    /// Trend description (e.g. "steady").
    pub trend: Option<String>,
    /// Time the reading was taken.
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl Reading {
    /// Glucose value in mmol/L, rounded to one decimal.
    pub fn mmol_l(&self) -> Option<f64> {
        self.value
            .map(|mg_dl| (f64::from(mg_dl) * MMOL_L_CONVERSION_FACTOR * 10.0).round() / 10.0)
    }

    /// True when no field carries data.
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.trend.is_none() && self.timestamp.is_none()
    }

    /// Render as three lines `value`, `trend`, `timestamp`.
    ///
    /// Returns `None` when every field is absent. Missing fields become
    /// empty lines so positions never shift.
    pub fn to_plain_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let value = self.value.map(|v| v.to_string()).unwrap_or_default();
        let trend = self.trend.clone().unwrap_or_default();
        let timestamp = self
            .timestamp
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();

        Some(format!("{}\n{}\n{}", value, trend, timestamp))
    }
}
