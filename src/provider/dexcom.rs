//! Dexcom Share API client.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::ProviderError;
use crate::reading::{Reading, Trend};

use super::ReadingProvider;

const ENDPOINT_AUTHENTICATE: &str = "General/AuthenticatePublisherAccount";
const ENDPOINT_LOGIN_BY_ID: &str = "General/LoginPublisherAccountById";
const ENDPOINT_LATEST_READINGS: &str = "Publisher/ReadPublisherLatestGlucoseValues";

/// Share answers this id when login did not really succeed.
const DEFAULT_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Window and count for the "current" reading.
const CURRENT_READING_MINUTES: u32 = 10;
const CURRENT_READING_MAX_COUNT: u32 = 1;

/// `Date(1691455258000)` or `Date(1691455258000-0400)`.
static SHARE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Date\((-?\d+)(?:([+-])(\d{2})(\d{2}))?\)$").expect("valid share date regex")
});

/// Error payload returned by Share on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
struct ShareErrorResponse {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Trend as sent by Share: a name in current API versions, an index in older ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ShareTrend {
    Name(String),
    Index(u8),
}

/// Raw glucose value entry from Share.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareReading {
    /// System time.
    #[serde(rename = "WT")]
    pub wt: Option<String>,
    /// Display time with the device's UTC offset.
    #[serde(rename = "DT")]
    pub dt: Option<String>,
    /// Glucose value in mg/dL.
    #[serde(rename = "Value")]
    pub value: Option<u32>,
    #[serde(rename = "Trend")]
    trend: Option<ShareTrend>,
}

impl ShareReading {
    /// Convert into a `Reading`, dropping fields that do not parse.
    pub fn into_reading(self) -> Reading {
        let trend = self.trend.and_then(|t| match t {
            ShareTrend::Name(name) => Trend::from_str(&name).ok(),
            ShareTrend::Index(index) => Trend::from_index(index),
        });

        let timestamp = self
            .dt
            .as_deref()
            .and_then(parse_share_date)
            .or_else(|| self.wt.as_deref().and_then(parse_share_date));

        Reading {
            value: self.value,
            trend: trend.map(|t| t.description().to_string()),
            timestamp,
        }
    }
}

/// Parse a Share `Date(ms[±hhmm])` string.
pub fn parse_share_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let caps = SHARE_DATE.captures(raw.trim())?;
    let millis: i64 = caps.get(1)?.as_str().parse().ok()?;

    let offset_seconds = match (caps.get(2), caps.get(3), caps.get(4)) {
        (Some(sign), Some(hours), Some(minutes)) => {
            let hours: i32 = hours.as_str().parse().ok()?;
            let minutes: i32 = minutes.as_str().parse().ok()?;
            let seconds = hours * 3600 + minutes * 60;
            if sign.as_str() == "-" {
                -seconds
            } else {
                seconds
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)?;
    DateTime::from_timestamp_millis(millis).map(|utc| utc.with_timezone(&offset))
}

/// Map a Share error payload onto `ProviderError`.
fn share_error(status: u16, body: &str) -> ProviderError {
    let payload: Option<ShareErrorResponse> = serde_json::from_str(body).ok();
    let code = payload
        .as_ref()
        .and_then(|p| p.code.clone())
        .unwrap_or_default();
    let message = payload
        .and_then(|p| p.message)
        .unwrap_or_else(|| body.to_string());

    match code.as_str() {
        "SessionIdNotFound" | "SessionNotValid" => ProviderError::SessionExpired(message),
        "AccountPasswordInvalid" => ProviderError::Authentication("invalid password".to_string()),
        "SSO_AuthenticateMaxAttemptsExceeded" => {
            ProviderError::Authentication("maximum authentication attempts exceeded".to_string())
        }
        _ => ProviderError::Api {
            status,
            code,
            message,
        },
    }
}

/// Cached Share login state.
#[derive(Debug, Default)]
struct Session {
    account_id: Option<String>,
    session_id: Option<String>,
}

/// Dexcom Share API client.
pub struct DexcomClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL for Share web services.
    base_url: String,
    /// Application id sent on login.
    application_id: String,
    /// Account name.
    username: Option<String>,
    /// Account password.
    password: Option<String>,
    /// Login state, reused across fetches.
    session: Mutex<Session>,
}

impl DexcomClient {
    /// Create a new Dexcom client from config.
    ///
    /// Credentials are not checked here; a missing username or password
    /// surfaces on the first fetch.
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        Self::with_base_url(config, config.dexcom_region.base_url())
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(config: &Config, base_url: &str) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .connect_timeout(std::time::Duration::from_secs(2))
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .build()?;

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        Ok(Self {
            http,
            base_url,
            application_id: config.dexcom_region.application_id().to_string(),
            username: config.dexcom_username.clone(),
            password: config.dexcom_password.clone(),
            session: Mutex::new(Session::default()),
        })
    }

    /// Get the Share base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        let username = self
            .username
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ProviderError::MissingCredentials("DEXCOM_USERNAME"))?;
        let password = self
            .password
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ProviderError::MissingCredentials("DEXCOM_PASSWORD"))?;
        Ok((username, password))
    }

    /// POST to a Share endpoint and decode the JSON answer.
    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        body: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .http
            .post(&url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(share_error(status.as_u16(), &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::Parse(format!("{}: {}", endpoint, e)))
    }

    /// Resolve the account id for the configured account name.
    #[instrument(skip(self))]
    async fn authenticate(&self) -> Result<String, ProviderError> {
        let (username, password) = self.credentials()?;

        let account_id: String = self
            .post(
                ENDPOINT_AUTHENTICATE,
                &[],
                json!({
                    "accountName": username,
                    "password": password,
                    "applicationId": self.application_id,
                }),
            )
            .await?;

        if account_id == DEFAULT_UUID || account_id.is_empty() {
            return Err(ProviderError::Authentication(
                "share returned no account id".to_string(),
            ));
        }

        debug!("Resolved Share account id");
        Ok(account_id)
    }

    /// Open a new session for `account_id`.
    #[instrument(skip(self, account_id))]
    async fn login(&self, account_id: &str) -> Result<String, ProviderError> {
        let (_, password) = self.credentials()?;

        let session_id: String = self
            .post(
                ENDPOINT_LOGIN_BY_ID,
                &[],
                json!({
                    "accountId": account_id,
                    "password": password,
                    "applicationId": self.application_id,
                }),
            )
            .await?;

        if session_id == DEFAULT_UUID || session_id.is_empty() {
            return Err(ProviderError::Authentication(
                "share returned no session id".to_string(),
            ));
        }

        debug!("Opened Share session");
        Ok(session_id)
    }

    /// Return the cached session id, logging in when there is none.
    async fn session_id(&self) -> Result<String, ProviderError> {
        let mut session = self.session.lock().await;

        if let Some(id) = &session.session_id {
            return Ok(id.clone());
        }

        let account_id = match session.account_id.clone() {
            Some(id) => id,
            None => {
                let id = self.authenticate().await?;
                session.account_id = Some(id.clone());
                id
            }
        };

        let session_id = self.login(&account_id).await?;
        session.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    async fn clear_session(&self) {
        self.session.lock().await.session_id = None;
    }

    /// Fetch up to `max_count` readings from the last `minutes`.
    #[instrument(skip(self, session_id))]
    async fn read_latest(
        &self,
        session_id: &str,
        minutes: u32,
        max_count: u32,
    ) -> Result<Vec<ShareReading>, ProviderError> {
        self.post(
            ENDPOINT_LATEST_READINGS,
            &[
                ("sessionId", session_id.to_string()),
                ("minutes", minutes.to_string()),
                ("maxCount", max_count.to_string()),
            ],
            json!({}),
        )
        .await
    }

    /// Fetch readings, re-establishing the session once if it expired.
    pub async fn glucose_readings(
        &self,
        minutes: u32,
        max_count: u32,
    ) -> Result<Vec<Reading>, ProviderError> {
        let session_id = self.session_id().await?;

        let raw = match self.read_latest(&session_id, minutes, max_count).await {
            Err(ProviderError::SessionExpired(reason)) => {
                warn!("Share session expired ({}), logging in again", reason);
                self.clear_session().await;
                let session_id = self.session_id().await?;
                self.read_latest(&session_id, minutes, max_count).await?
            }
            other => other?,
        };

        Ok(raw.into_iter().map(ShareReading::into_reading).collect())
    }
}

#[async_trait]
impl ReadingProvider for DexcomClient {
    async fn current_reading(&self) -> Result<Reading, ProviderError> {
        self.glucose_readings(CURRENT_READING_MINUTES, CURRENT_READING_MAX_COUNT)
            .await?
            .into_iter()
            .next()
            .ok_or(ProviderError::NoReadings)
    }
}
