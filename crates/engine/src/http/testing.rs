//! Scripted transport for driving platform clients without a network.
//!
//! Compiled for the crate's own tests and, with the `testing` feature,
//! for downstream test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use marketsync_core::PlatformType;

use super::{
    ApiRequest, ApiResponse, HttpTransport, RateLimitConfig, RateLimiter, RequestExecutor,
    RetryPolicy, TransportError,
};

#[derive(Clone)]
enum Reply {
    Respond(ApiResponse),
    Drop(String),
}

/// [`HttpTransport`] that answers from a script keyed by URL path.
///
/// Replies queued for a path are used in order and the last one repeats.
/// Paths with no script get a 404.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queue a JSON reply for `path`.
    pub fn on(&self, path: &str, status: u16, body: serde_json::Value) {
        self.push(
            path,
            Reply::Respond(ApiResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    /// Queue a network failure for `path`.
    pub fn fail(&self, path: &str, message: &str) {
        self.push(path, Reply::Drop(message.to_string()));
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests sent to `path`.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url.path() == path)
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let reply = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            match routes.get_mut(request.url.path()) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Drop(message)) => Err(TransportError::Network(message)),
            None => Ok(ApiResponse {
                status: 404,
                body: format!("no route for {}", request.url.path()),
            }),
        }
    }
}

/// Three attempts with millisecond backoff so failure scripts finish quickly.
#[must_use]
pub const fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

/// No retries; a failing script fails on the first request.
#[must_use]
pub const fn single_attempt() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 1,
        base_delay: Duration::from_millis(1),
    }
}

/// Executor over `transport` with a budget no test exhausts.
#[must_use]
pub fn executor(
    platform: PlatformType,
    transport: Arc<ScriptedTransport>,
    retry: RetryPolicy,
) -> RequestExecutor {
    RequestExecutor::new(
        platform,
        transport,
        RateLimiter::new(RateLimitConfig::per_minute(10_000)),
        retry,
    )
}
