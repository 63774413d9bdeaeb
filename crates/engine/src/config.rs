//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional; the defaults match the marketplaces'
//! published limits.
//!
//! ## Orchestration
//! - `SYNC_CONCURRENCY` - Connections synced in parallel (default: 4)
//! - `SYNC_MAX_RETRIES` - Attempts per platform request (default: 3)
//! - `SYNC_RETRY_BASE_DELAY_MS` - Backoff unit; attempt `n` waits `2^n` units (default: 1000)
//! - `SYNC_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//!
//! ## Orders
//! - `SYNC_ORDER_LOOKBACK_DAYS` - Window used when no dates are given, 1 to 365 (default: 7)
//! - `SYNC_ORDER_PAGE_SIZE` - Orders requested per page (default: 50)
//! - `SYNC_MAX_ORDER_PAGES` - Page cap per connection and run (default: 20)
//!
//! ## Platforms
//! - `SHOPEE_BASE_URL`, `MOMO_BASE_URL`, `SHOPLINE_BASE_URL` - API hosts
//! - `SHOPEE_RATE_LIMIT`, `MOMO_RATE_LIMIT`, `SHOPLINE_RATE_LIMIT` - Requests per minute

use std::str::FromStr;
use std::time::Duration;

use marketsync_core::PlatformType;
use thiserror::Error;

use crate::http::executor::RetryPolicy;
use crate::http::rate_limit::{RateLimitConfig, rate_limits};

/// Default Shopee Open Platform host.
pub const SHOPEE_BASE_URL: &str = "https://partner.shopeemobile.com";
/// Default momo merchant API host.
pub const MOMO_BASE_URL: &str = "https://api.momoshop.com.tw";
/// Default SHOPLINE Open API host.
pub const SHOPLINE_BASE_URL: &str = "https://api.shoplineapp.com";

/// Longest default order window. Marketplaces keep order search to about a year.
pub const MAX_ORDER_LOOKBACK_DAYS: i64 = 365;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of connections worked on at once
    pub concurrency: usize,
    /// Retry behaviour for platform requests
    pub retry: RetryPolicy,
    /// Timeout for a single HTTP request
    pub http_timeout: Duration,
    /// Order pull settings
    pub orders: OrderSyncConfig,
    /// Shopee host and request budget
    pub shopee: PlatformEndpoint,
    /// momo host and request budget
    pub momo: PlatformEndpoint,
    /// SHOPLINE host and request budget
    pub shopline: PlatformEndpoint,
}

/// Order pull settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSyncConfig {
    /// Days to look back when no start date is given
    pub lookback_days: i64,
    /// Orders requested per page
    pub page_size: u32,
    /// Page cap per connection and run
    pub max_pages: u32,
}

/// Where a platform's API lives and how hard it may be hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEndpoint {
    /// API host without a trailing slash
    pub base_url: String,
    /// Request budget per window
    pub rate_limit: RateLimitConfig,
}

impl Default for OrderSyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            page_size: 50,
            max_pages: 20,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(30),
            orders: OrderSyncConfig::default(),
            shopee: PlatformEndpoint {
                base_url: SHOPEE_BASE_URL.to_string(),
                rate_limit: rate_limits::SHOPEE,
            },
            momo: PlatformEndpoint {
                base_url: MOMO_BASE_URL.to_string(),
                rate_limit: rate_limits::MOMO,
            },
            shopline: PlatformEndpoint {
                base_url: SHOPLINE_BASE_URL.to_string(),
                rate_limit: rate_limits::SHOPLINE,
            },
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();

        let concurrency: usize = env.parse_or("SYNC_CONCURRENCY", defaults.concurrency)?;
        if concurrency == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let max_attempts: u32 = env.parse_or("SYNC_MAX_RETRIES", defaults.retry.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_MAX_RETRIES".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let base_delay_ms: u64 = env.parse_or("SYNC_RETRY_BASE_DELAY_MS", 1000)?;
        let timeout_secs: u64 = env.parse_or("SYNC_HTTP_TIMEOUT_SECS", 30)?;

        let orders = OrderSyncConfig {
            lookback_days: env.parse_or("SYNC_ORDER_LOOKBACK_DAYS", defaults.orders.lookback_days)?,
            page_size: env.parse_or("SYNC_ORDER_PAGE_SIZE", defaults.orders.page_size)?,
            max_pages: env.parse_or("SYNC_MAX_ORDER_PAGES", defaults.orders.max_pages)?,
        };
        if !(1..=MAX_ORDER_LOOKBACK_DAYS).contains(&orders.lookback_days) {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_ORDER_LOOKBACK_DAYS".to_string(),
                format!("must be between 1 and {MAX_ORDER_LOOKBACK_DAYS}"),
            ));
        }
        if orders.page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_ORDER_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            concurrency,
            retry: RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(base_delay_ms),
            },
            http_timeout: Duration::from_secs(timeout_secs),
            orders,
            shopee: env.endpoint("SHOPEE", &defaults.shopee)?,
            momo: env.endpoint("MOMO", &defaults.momo)?,
            shopline: env.endpoint("SHOPLINE", &defaults.shopline)?,
        })
    }

    /// Endpoint settings for an implemented platform.
    #[must_use]
    pub const fn endpoint(&self, platform: PlatformType) -> Option<&PlatformEndpoint> {
        match platform {
            PlatformType::Shopee => Some(&self.shopee),
            PlatformType::Momo => Some(&self.momo),
            PlatformType::Shopline => Some(&self.shopline),
            PlatformType::Ruten | PlatformType::Pchome | PlatformType::Yahoo => None,
        }
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get_optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    fn endpoint(
        &self,
        prefix: &str,
        defaults: &PlatformEndpoint,
    ) -> Result<PlatformEndpoint, ConfigError> {
        let url_key = format!("{prefix}_BASE_URL");
        let base_url = match self.get_optional(&url_key) {
            Some(raw) => {
                let parsed = url::Url::parse(raw.trim())
                    .map_err(|e| ConfigError::InvalidEnvVar(url_key.clone(), e.to_string()))?;
                parsed.as_str().trim_end_matches('/').to_string()
            }
            None => defaults.base_url.clone(),
        };

        let limit_key = format!("{prefix}_RATE_LIMIT");
        let max_requests: u32 = self.parse_or(&limit_key, defaults.rate_limit.max_requests)?;
        if max_requests == 0 {
            return Err(ConfigError::InvalidEnvVar(
                limit_key,
                "must be at least 1".to_string(),
            ));
        }

        Ok(PlatformEndpoint {
            base_url,
            rate_limit: RateLimitConfig {
                max_requests,
                window: defaults.rate_limit.window,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<SyncConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        SyncConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert_eq!(config.orders.lookback_days, 7);
        assert_eq!(config.shopee.base_url, SHOPEE_BASE_URL);
        assert_eq!(config.shopee.rate_limit.max_requests, 1000);
        assert_eq!(config.momo.rate_limit.max_requests, 500);
        assert_eq!(config.shopline.rate_limit.max_requests, 120);
        assert_eq!(config.shopline.rate_limit.window, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = load(&[
            ("SYNC_CONCURRENCY", "8"),
            ("SYNC_MAX_RETRIES", "5"),
            ("SYNC_ORDER_PAGE_SIZE", "100"),
            ("MOMO_BASE_URL", "http://127.0.0.1:9000/"),
            ("MOMO_RATE_LIMIT", "10"),
        ])
        .unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.orders.page_size, 100);
        assert_eq!(config.momo.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.momo.rate_limit.max_requests, 10);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = load(&[("SYNC_CONCURRENCY", "  ")]).unwrap();
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = load(&[("SYNC_CONCURRENCY", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SYNC_CONCURRENCY"));
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        assert!(load(&[("SYNC_CONCURRENCY", "0")]).is_err());
        assert!(load(&[("SYNC_MAX_RETRIES", "0")]).is_err());
        assert!(load(&[("SHOPEE_RATE_LIMIT", "0")]).is_err());
    }

    #[test]
    fn test_lookback_outside_a_year_is_rejected() {
        for raw in ["0", "-3", "366", "1000000000000"] {
            let err = load(&[("SYNC_ORDER_LOOKBACK_DAYS", raw)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SYNC_ORDER_LOOKBACK_DAYS"),
                "{raw}"
            );
        }
        let config = load(&[("SYNC_ORDER_LOOKBACK_DAYS", "365")]).unwrap();
        assert_eq!(config.orders.lookback_days, 365);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = load(&[("SHOPLINE_BASE_URL", "not a url")]).unwrap_err();
        assert!(err.to_string().contains("SHOPLINE_BASE_URL"));
    }

    #[test]
    fn test_endpoint_lookup() {
        let config = SyncConfig::default();
        assert!(config.endpoint(PlatformType::Momo).is_some());
        assert!(config.endpoint(PlatformType::Yahoo).is_none());
    }
}
