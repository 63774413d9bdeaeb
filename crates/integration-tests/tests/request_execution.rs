//! Retries, rate limiting and cancellation of platform requests.

use std::time::{Duration, Instant};

use marketsync::PlatformError;
use marketsync::http::{ApiRequest, RateLimitConfig, RateLimiter, RequestExecutor, RetryPolicy};
use marketsync_core::PlatformType;
use marketsync_integration_tests::{ScriptedTransport, executor, fast_retry};
use reqwest::Method;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;

const PATH: &str = "/api/v1/merchant/info";

fn request() -> ApiRequest {
    let url = Url::parse(&format!("https://momo.test{PATH}")).expect("static URL");
    ApiRequest::new(Method::GET, url)
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let transport = ScriptedTransport::new();
    transport.on(PATH, 500, json!({"message": "busy"}));
    transport.on(PATH, 502, json!({"message": "gateway"}));
    transport.on(PATH, 200, json!({"data": {"ok": true}}));

    let response = executor(PlatformType::Momo, transport.clone())
        .execute(&request())
        .await
        .expect("third attempt succeeds");

    assert_eq!(response.status, 200);
    assert_eq!(transport.requests_to(PATH).len(), 3);
}

#[tokio::test]
async fn test_last_error_is_returned_when_attempts_run_out() {
    let transport = ScriptedTransport::new();
    transport.on(PATH, 503, json!({"message": "down"}));

    let err = executor(PlatformType::Momo, transport.clone())
        .execute(&request())
        .await
        .expect_err("every attempt fails");

    match err {
        PlatformError::Http { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("down"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
    assert_eq!(transport.requests_to(PATH).len(), 3);
}

#[tokio::test]
async fn test_network_failures_are_retried() {
    let transport = ScriptedTransport::new();
    transport.fail(PATH, "connection reset by peer");
    transport.on(PATH, 200, json!({"data": {}}));

    let response = executor(PlatformType::Momo, transport.clone())
        .execute(&request())
        .await
        .expect("second attempt succeeds");

    assert!(response.is_success());
    assert_eq!(transport.requests_to(PATH).len(), 2);
}

#[tokio::test]
async fn test_single_attempt_policy_does_not_retry() {
    let transport = ScriptedTransport::new();
    transport.on(PATH, 500, json!({}));

    let executor = RequestExecutor::new(
        PlatformType::Momo,
        transport.clone(),
        RateLimiter::default(),
        RetryPolicy {
            max_attempts: 1,
            ..fast_retry()
        },
    );
    let err = executor.execute(&request()).await.expect_err("no retries");

    assert!(err.is_retryable());
    assert_eq!(transport.requests_to(PATH).len(), 1);
}

#[tokio::test]
async fn test_unreadable_success_body_is_a_parse_error() {
    let transport = ScriptedTransport::new();
    transport.on(PATH, 200, json!(["not", "an", "object"]));

    let err = executor(PlatformType::Momo, transport.clone())
        .execute_json::<std::collections::HashMap<String, String>>(&request())
        .await
        .expect_err("array is not a map");

    assert!(matches!(err, PlatformError::Parse { platform: PlatformType::Momo, .. }));
    assert_eq!(transport.requests_to(PATH).len(), 1);
}

#[test]
fn test_default_backoff_doubles() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, 3);
    assert_eq!(policy.delay_after(1), Duration::from_secs(2));
    assert_eq!(policy.delay_after(2), Duration::from_secs(4));
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_exhausted_window_makes_callers_wait() {
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests: 2,
        window: Duration::from_millis(200),
    });

    let started = Instant::now();
    limiter.acquire().await;
    limiter.acquire().await;
    assert_eq!(limiter.remaining().await, 0);
    assert!(started.elapsed() < Duration::from_millis(100));

    limiter.acquire().await;
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(limiter.remaining().await, 1);
}

#[tokio::test]
async fn test_retries_reuse_the_request_slot() {
    let transport = ScriptedTransport::new();
    transport.on(PATH, 500, json!({}));
    transport.on(PATH, 200, json!({}));

    // One slot per minute: a retry that took a second slot would stall.
    let executor = RequestExecutor::new(
        PlatformType::Momo,
        transport.clone(),
        RateLimiter::new(RateLimitConfig::per_minute(1)),
        fast_retry(),
    );
    let response = tokio::time::timeout(Duration::from_secs(5), executor.execute(&request()))
        .await
        .expect("retry did not wait for a new window")
        .expect("second attempt succeeds");

    assert_eq!(response.status, 200);
    assert_eq!(transport.requests_to(PATH).len(), 2);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_executor_sends_nothing() {
    let transport = ScriptedTransport::new();
    transport.on(PATH, 200, json!({}));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = executor(PlatformType::Momo, transport.clone())
        .with_cancellation(cancel)
        .execute(&request())
        .await
        .expect_err("cancelled before sending");

    assert!(matches!(err, PlatformError::Cancelled));
    assert!(transport.requests().is_empty());
}
