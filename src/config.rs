//! Application configuration loaded from environment variables.

use serde::Deserialize;
use strum::{Display, EnumString};

use crate::error::Result;

/// Dexcom Share region; selects the base URL and application id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// United States.
    #[default]
    #[serde(alias = "US")]
    #[strum(serialize = "us", serialize = "US")]
    Us,
    /// Outside the United States.
    #[serde(alias = "OUS")]
    #[strum(serialize = "ous", serialize = "OUS")]
    Ous,
    /// Japan.
    #[serde(alias = "JP")]
    #[strum(serialize = "jp", serialize = "JP")]
    Jp,
}

impl Region {
    /// Share web services base URL, with trailing slash.
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::Us => "https://share2.dexcom.com/ShareWebServices/Services/",
            Region::Ous => "https://shareous1.dexcom.com/ShareWebServices/Services/",
            Region::Jp => "https://share.dexcom.jp/ShareWebServices/Services/",
        }
    }

    /// Application id sent with login requests.
    pub fn application_id(&self) -> &'static str {
        match self {
            Region::Us | Region::Ous => "d89443d2-327c-4a6f-89e5-496bbb0317db",
            Region::Jp => "d8665ade-9673-4e27-9ff6-92db4ce13d13",
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Dexcom Credentials ===
    /// Dexcom Share account name.
    #[serde(default)]
    pub dexcom_username: Option<String>,

    /// Dexcom Share password.
    #[serde(default)]
    pub dexcom_password: Option<String>,

    /// Share region.
    #[serde(default)]
    pub dexcom_region: Region,

    // === Fetching ===
    /// Upper bound for a single provider fetch, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Expose `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_port() -> u16 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dexcom_username: None,
            dexcom_password: None,
            dexcom_region: Region::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            port: default_port(),
            metrics_enabled: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Names of credential variables that are unset or blank.
    ///
    /// Missing credentials do not prevent startup; the provider fails on
    /// first use instead.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        let mut missing = Vec::new();
        if blank(&self.dexcom_username) {
            missing.push("DEXCOM_USERNAME");
        }
        if blank(&self.dexcom_password) {
            missing.push("DEXCOM_PASSWORD");
        }
        missing
    }

    /// Fetch timeout as a `Duration`.
    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fetch_timeout_ms)
    }
}
