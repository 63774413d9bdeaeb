//! HTTP plumbing shared by every platform client.
//!
//! Platform clients never talk to `reqwest` directly. They build an
//! [`ApiRequest`], hand it to a [`RequestExecutor`](executor::RequestExecutor)
//! and get an [`ApiResponse`] back. The executor owns rate limiting and
//! retries; the [`HttpTransport`] underneath only moves bytes, which keeps
//! it trivial to replace with a scripted transport in tests.

pub mod executor;
pub mod rate_limit;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

pub use executor::{RequestExecutor, RetryPolicy};
pub use rate_limit::{RateLimitConfig, RateLimiter};

/// Errors raised below the HTTP status layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client failed (connect, TLS, timeout, body read).
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    /// Any other network failure.
    #[error("{0}")]
    Network(String),
}

/// An outgoing request, independent of the HTTP client.
#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A request with no headers and no body.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first header named `name`, ignoring case.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Value of the first query parameter named `name`.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

// Query strings and header values carry tokens and signatures.
impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<_> = self.headers.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("host", &self.url.host_str())
            .field("path", &self.url.path())
            .field("headers", &header_names)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// A response as returned by the transport, before status checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Moves a request over the wire and returns whatever came back.
///
/// Implementations must not interpret the status code; non-2xx responses
/// are returned as `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("marketsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_query_and_header_values() {
        let url = Url::parse("https://partner.example.com/api?access_token=sekrit&sign=abc").unwrap();
        let request = ApiRequest::new(Method::GET, url).header("X-Api-Key", "also-sekrit");

        let debug = format!("{request:?}");
        assert!(!debug.contains("sekrit"));
        assert!(debug.contains("X-Api-Key"));
        assert!(debug.contains("/api"));
    }

    #[test]
    fn test_header_and_query_lookup() {
        let url = Url::parse("https://h.example.com/p?partner_id=1&sign=ff").unwrap();
        let request = ApiRequest::new(Method::GET, url).header("X-Store-Id", "s1");

        assert_eq!(request.header_value("x-store-id"), Some("s1"));
        assert_eq!(request.query_value("sign").as_deref(), Some("ff"));
        assert!(request.query_value("missing").is_none());
    }

    #[test]
    fn test_response_success_range() {
        let ok = ApiResponse {
            status: 204,
            body: String::new(),
        };
        let redirect = ApiResponse {
            status: 302,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }
}
