//! Small conversions shared by the platform wire formats.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use url::Url;

use super::{PlatformError, PlatformResult};

/// Join an API host and an absolute path.
///
/// Unlike [`Url::join`], a path prefix on `base` (e.g. a mock server
/// mounted under `/momo`) is kept.
pub(crate) fn endpoint(base: &str, path: &str) -> PlatformResult<Url> {
    let raw = format!("{}{path}", base.trim_end_matches('/'));
    Url::parse(&raw).map_err(|e| PlatformError::InvalidRequest(format!("bad URL {raw}: {e}")))
}

/// Money from a JSON float. Non-finite values become zero.
pub(crate) fn decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or_default()
}

/// Money as a JSON number, the way every platform expects prices.
pub(crate) fn money(value: Decimal) -> serde_json::Value {
    value
        .to_f64()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| serde_json::Value::String(value.to_string()), serde_json::Value::Number)
}

/// `Some(s)` unless `s` is blank.
pub(crate) fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse an RFC 3339 timestamp, ignoring garbage.
pub(crate) fn timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a unix timestamp in seconds.
pub(crate) fn unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Outcome of a connection check.
///
/// A platform that answers but rejects the credentials is a clean `false`;
/// anything else that went wrong is passed through.
pub(crate) fn connection_verdict(result: PlatformResult<()>) -> PlatformResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(err) if err.is_unauthorized() || matches!(err, PlatformError::Api { .. }) => {
            tracing::debug!(error = %err, "Connection test rejected");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = endpoint("http://127.0.0.1:9000/momo/", "/api/v1/products").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/momo/api/v1/products");
    }

    #[test]
    fn test_money_round_trip() {
        assert_eq!(decimal(199.5), Decimal::new(1995, 1));
        assert_eq!(money(Decimal::new(1995, 1)), serde_json::json!(199.5));
        assert_eq!(decimal(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  sku "), Some("sku".to_string()));
        assert!(non_empty("   ").is_none());
    }

    #[test]
    fn test_connection_verdict() {
        assert!(connection_verdict(Ok(())).unwrap());
        let rejected = PlatformError::Http {
            status: 401,
            body: String::new(),
        };
        assert!(!connection_verdict(Err(rejected)).unwrap());
        assert!(connection_verdict(Err(PlatformError::Transport("reset".into()))).is_err());
    }

    #[test]
    fn test_timestamps() {
        assert!(timestamp("2024-03-01T10:00:00+08:00").is_some());
        assert!(timestamp("yesterday").is_none());
        assert_eq!(unix_seconds(0).unwrap().to_rfc3339(), "1970-01-01T00:00:00+00:00");
    }
}
