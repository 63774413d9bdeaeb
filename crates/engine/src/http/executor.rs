//! Rate-limited, retrying request execution.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use marketsync_core::PlatformType;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::rate_limit::RateLimiter;
use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::platform::{PlatformError, PlatformResult};

/// How many times a request is attempted and how long to wait in between.
///
/// After failed attempt `n` (counting from 1) the executor waits
/// `base_delay * 2^n`, so the defaults give 2s then 4s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    fn backoff(&self) -> ExponentialBuilder {
        let retries = self.max_attempts.saturating_sub(1);
        ExponentialBuilder::default()
            .with_min_delay(self.delay_after(1))
            .with_factor(2.0)
            .with_max_delay(self.delay_after(retries.max(1)))
            .with_max_times(retries as usize)
    }
}

/// Sends platform requests through a rate limiter with retries.
///
/// One slot is taken from the limiter per [`execute`](Self::execute) call;
/// retries of the same request reuse it. Non-2xx responses and transport
/// failures are retried; when attempts run out the last error is returned
/// unchanged. Every wait (rate limit, backoff, network) stops early when
/// the cancellation token fires.
pub struct RequestExecutor {
    platform: PlatformType,
    transport: Arc<dyn HttpTransport>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl RequestExecutor {
    #[must_use]
    pub fn new(
        platform: PlatformType,
        transport: Arc<dyn HttpTransport>,
        limiter: RateLimiter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            platform,
            transport,
            limiter,
            retry,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and future requests when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Platform this executor talks to; used in logs and errors.
    #[must_use]
    pub const fn platform(&self) -> PlatformType {
        self.platform
    }

    /// Send `request`, retrying failures per the retry policy.
    ///
    /// # Errors
    ///
    /// - `PlatformError::Http` with the last status and body if every
    ///   attempt got a non-2xx response
    /// - `PlatformError::Transport` if the last attempt failed below HTTP
    /// - `PlatformError::Cancelled` if the token fired first
    #[instrument(
        skip(self, request),
        fields(platform = %self.platform, method = %request.method, path = %request.url.path())
    )]
    pub async fn execute(&self, request: &ApiRequest) -> PlatformResult<ApiResponse> {
        if self.cancel.is_cancelled() {
            return Err(PlatformError::Cancelled);
        }

        let attempts = AtomicU32::new(0);
        let run = async {
            self.limiter.acquire().await;

            let attempts = &attempts;
            (|| async move {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(attempt, "Sending request");
                self.send_once(request).await
            })
            .retry(self.retry.backoff())
            .when(PlatformError::is_retryable)
            .notify(|err: &PlatformError, delay: Duration| {
                warn!(
                    error = %err,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Request failed, retrying"
                );
            })
            .await
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!(attempts = attempts.load(Ordering::Relaxed), "Request cancelled");
                Err(PlatformError::Cancelled)
            }
            result = run => result,
        }
    }

    /// [`execute`](Self::execute) and decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Anything `execute` returns, or `PlatformError::Parse` if the body
    /// does not match `T`.
    pub async fn execute_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> PlatformResult<T> {
        let response = self.execute(request).await?;
        response.json().map_err(|e| PlatformError::Parse {
            platform: self.platform,
            message: e.to_string(),
        })
    }

    async fn send_once(&self, request: &ApiRequest) -> PlatformResult<ApiResponse> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(PlatformError::Http {
                status: response.status,
                body: response.body,
            })
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("platform", &self.platform)
            .field("limiter", &self.limiter.config())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
