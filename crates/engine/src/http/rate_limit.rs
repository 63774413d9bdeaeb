//! Fixed-window request budget for a single platform client.
//!
//! Each client owns its own [`RateLimiter`]; limiters are never shared
//! between connections, so one shop's traffic cannot starve another's.
//!
//! The window is fixed, not sliding: a burst at the end of one window
//! followed by a burst at the start of the next can briefly exceed
//! `max_requests` over an arbitrary interval of `window` length. Each
//! individual window never admits more than `max_requests`, so any
//! interval of `window` length admits at most `2 * max_requests`.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Budget for one limiter: `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    /// A budget of `max_requests` per minute.
    #[must_use]
    pub const fn per_minute(max_requests: u32) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        rate_limits::DEFAULT
    }
}

/// Published per-platform request budgets.
pub mod rate_limits {
    use super::RateLimitConfig;

    /// Used for platforms without a published limit.
    pub const DEFAULT: RateLimitConfig = RateLimitConfig::per_minute(100);

    /// Shopee Open Platform: 1000 requests/minute per shop.
    pub const SHOPEE: RateLimitConfig = RateLimitConfig::per_minute(1000);

    /// momo merchant API: 500 requests/minute.
    pub const MOMO: RateLimitConfig = RateLimitConfig::per_minute(500);

    /// SHOPLINE Open API: 120 requests/minute.
    pub const SHOPLINE: RateLimitConfig = RateLimitConfig::per_minute(120);
}

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u32,
}

impl Window {
    fn reset(&mut self, now: Instant) {
        self.started = now;
        self.used = 0;
    }
}

/// Fixed-window limiter; see the module docs.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// A limiter whose first window starts now.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    /// The budget this limiter enforces.
    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Wait until the current window has a free slot, then take it.
    ///
    /// Waiters queue on the window lock in arrival order, so a caller that
    /// is sleeping out an exhausted window holds back everyone behind it.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;

        let now = Instant::now();
        if now.duration_since(window.started) > self.config.window {
            window.reset(now);
        }

        if window.used >= self.config.max_requests {
            let wait = self
                .config
                .window
                .saturating_sub(now.duration_since(window.started));
            debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                max_requests = self.config.max_requests,
                "Rate limit reached, waiting for next window"
            );
            tokio::time::sleep(wait).await;
            window.reset(Instant::now());
        }

        window.used += 1;
    }

    /// Slots left in the current window, without taking one.
    pub async fn remaining(&self) -> u32 {
        let window = self.window.lock().await;
        if Instant::now().duration_since(window.started) > self.config.window {
            return self.config.max_requests;
        }
        self.config.max_requests.saturating_sub(window.used)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
