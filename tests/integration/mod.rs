//! Integration tests for the glucose relay.
//!
//! The router tests run against the mock provider. The live tests require
//! DEXCOM_USERNAME and DEXCOM_PASSWORD.
//! Run with: cargo test --test integration -- --ignored
//!
//! Note: The live tests talk to the real Dexcom Share API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use tower::ServiceExt;

use glucose_relay::api::{create_router, AppState};
use glucose_relay::cache::{FetchOutcome, ReadingCache};
use glucose_relay::config::Config;
use glucose_relay::provider::{DexcomClient, MockReadingProvider, ReadingProvider};
use glucose_relay::reading::Reading;

/// Get a live config from environment.
fn live_config() -> Option<Config> {
    let config = Config::load().ok()?;

    if !config.missing_credentials().is_empty() {
        return None;
    }

    Some(config)
}

async fn body_of(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Full request cycle: fetch, then gate, through the public router.
#[tokio::test]
async fn test_relay_gates_provider_calls() {
    let provider = MockReadingProvider::with_reading(Reading {
        value: Some(104),
        trend: Some("falling slightly".to_string()),
        timestamp: None,
    });
    let state = AppState::new(
        Arc::new(provider.clone()),
        ReadingCache::new(Duration::from_secs(1)),
    );
    let app = create_router(state);

    let (status, body) = body_of(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "104\nfalling slightly\n");

    for _ in 0..5 {
        let (status, body) = body_of(&app, "/").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "No Data");
    }

    let (status, body) = body_of(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    assert_eq!(provider.calls(), 1);
}

/// A short interval lets a later request reach the provider again.
#[tokio::test]
async fn test_cache_refetches_after_interval() {
    let provider = MockReadingProvider::with_reading(Reading {
        value: Some(88),
        ..Reading::default()
    });
    let cache = ReadingCache::with_interval(Duration::from_secs(58), Duration::from_secs(1));
    let t0 = Instant::now();

    assert!(matches!(cache.refresh(&provider, t0).await, FetchOutcome::Fetched(_)));
    assert!(matches!(
        cache.refresh(&provider, t0 + Duration::from_secs(20)).await,
        FetchOutcome::Skipped { .. }
    ));
    assert!(matches!(
        cache.refresh(&provider, t0 + Duration::from_secs(80)).await,
        FetchOutcome::Fetched(_)
    ));
    assert_eq!(provider.calls(), 2);
}

/// Test that we can fetch the current reading from Share.
#[tokio::test]
#[ignore = "requires DEXCOM_USERNAME and DEXCOM_PASSWORD"]
async fn test_current_reading() {
    let config = match live_config() {
        Some(c) => c,
        None => {
            println!("Skipping: DEXCOM_USERNAME or DEXCOM_PASSWORD not set");
            return;
        }
    };

    let client = DexcomClient::new(&config).expect("client should build");

    let result = client.current_reading().await;
    assert!(result.is_ok(), "Failed to get reading: {:?}", result.err());

    let reading = result.unwrap();
    println!("{}", reading.to_plain_text().unwrap_or_default());
}

/// Bad credentials degrade to an error, never a panic.
#[tokio::test]
#[ignore = "requires network access"]
async fn test_bad_credentials_are_rejected() {
    let config = Config {
        dexcom_username: Some("not-a-real-account".to_string()),
        dexcom_password: Some("wrong".to_string()),
        ..Config::default()
    };

    let client = DexcomClient::new(&config).expect("client should build");

    assert!(client.current_reading().await.is_err());
}
