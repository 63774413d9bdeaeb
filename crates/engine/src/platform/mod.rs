//! Marketplace clients behind one capability trait.
//!
//! Each supported marketplace has its own module implementing
//! [`PlatformAdapter`]. Adapters own request signing, field mapping between
//! canonical and native shapes, and the platform's status tables. All HTTP
//! goes through a [`RequestExecutor`](crate::http::RequestExecutor), so
//! rate limiting, retries and cancellation behave the same everywhere.
//!
//! Use [`PlatformClientFactory`] to build adapters; it validates
//! credentials before any network call.

pub mod factory;
pub mod momo;
pub mod shopee;
pub mod shopline;
mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marketsync_core::{
    CanonicalProduct, OrderStatus, PlatformOrder, PlatformProduct, PlatformType, ProductUpdate,
    TokenGrant,
};
use rust_decimal::Decimal;
use thiserror::Error;

pub use factory::{ClientFactory, PlatformClientFactory, test_platform_connection};
pub use momo::MomoClient;
pub use shopee::ShopeeClient;
pub use shopline::ShoplineClient;

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Days of orders fetched when a caller gives no start date.
pub const DEFAULT_ORDER_LOOKBACK_DAYS: i64 = 7;

/// Errors returned by platform adapters.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never got an HTTP answer.
    #[error("{0}")]
    Transport(String),

    /// The platform answered 2xx but the body was not what we expected.
    #[error("{platform} returned an unreadable response: {message}")]
    Parse {
        platform: PlatformType,
        message: String,
    },

    /// The platform reported an error inside a successful response.
    #[error("{platform} API error {code}: {message}")]
    Api {
        platform: PlatformType,
        code: String,
        message: String,
    },

    /// The requested entity does not exist on the platform.
    #[error("{0}")]
    NotFound(String),

    /// The platform does not offer this capability at all.
    #[error("{platform} does not support {operation}: {reason}")]
    Unsupported {
        platform: PlatformType,
        operation: &'static str,
        reason: &'static str,
    },

    /// The request could not be built from the given input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The operation was cancelled before it finished.
    #[error("Request cancelled")]
    Cancelled,
}

impl PlatformError {
    /// Whether retrying the same request might succeed.
    ///
    /// Only HTTP and transport failures qualify; semantic errors (not found,
    /// unsupported, API-level rejections) are surfaced immediately.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Transport(_))
    }

    /// Whether the platform rejected our credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http { status: 401 | 403, .. })
    }

    /// Shorthand for a `NotFound` about `entity` with native id `id`.
    #[must_use]
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{entity} {id} not found"))
    }
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Filters for [`PlatformAdapter::get_orders`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    /// 1-based page number
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<OrderStatus>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl OrderQuery {
    /// Requested page, at least 1.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Requested page size, at least 1.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    /// Zero-based offset of the first order on the requested page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    /// Date window, defaulting to the last seven days before `now`.
    #[must_use]
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.end.unwrap_or(now);
        let start = self
            .start
            .unwrap_or_else(|| end - Duration::days(DEFAULT_ORDER_LOOKBACK_DAYS));
        (start, end)
    }
}

/// The capabilities every marketplace client offers.
///
/// Methods return a [`PlatformResult`] instead of panicking or silently
/// doing nothing; a platform that cannot perform an operation at all
/// returns [`PlatformError::Unsupported`].
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Which marketplace this client talks to.
    fn platform(&self) -> PlatformType;

    /// Exchange the refresh token for a new access token.
    ///
    /// The client starts using the new token immediately; persisting it is
    /// the caller's job.
    async fn refresh_token(&self) -> PlatformResult<TokenGrant>;

    async fn get_products(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> PlatformResult<Vec<PlatformProduct>>;

    async fn get_product(&self, platform_product_id: &str) -> PlatformResult<PlatformProduct>;

    /// Create `product` remotely and return it as the platform now sees it.
    async fn create_product(&self, product: &CanonicalProduct) -> PlatformResult<PlatformProduct>;

    /// Apply the set fields of `update` and return the refreshed product.
    async fn update_product(
        &self,
        platform_product_id: &str,
        update: &ProductUpdate,
    ) -> PlatformResult<PlatformProduct>;

    async fn delete_product(&self, platform_product_id: &str) -> PlatformResult<()>;

    async fn update_stock(&self, platform_product_id: &str, stock: i64) -> PlatformResult<()>;

    async fn update_price(&self, platform_product_id: &str, price: Decimal) -> PlatformResult<()>;

    async fn get_orders(&self, query: &OrderQuery) -> PlatformResult<Vec<PlatformOrder>>;

    async fn get_order(&self, platform_order_id: &str) -> PlatformResult<PlatformOrder>;

    async fn update_order_status(
        &self,
        platform_order_id: &str,
        status: OrderStatus,
    ) -> PlatformResult<()>;

    async fn update_shipping(
        &self,
        platform_order_id: &str,
        tracking_number: &str,
        carrier: Option<&str>,
    ) -> PlatformResult<()>;

    /// Make a cheap authenticated call to check the credentials work.
    async fn test_connection(&self) -> PlatformResult<bool>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_only_transport_level_errors_retry() {
        assert!(PlatformError::Http {
            status: 502,
            body: String::new()
        }
        .is_retryable());
        assert!(PlatformError::Transport("reset".to_string()).is_retryable());
        assert!(!PlatformError::not_found("Product", "1").is_retryable());
        assert!(!PlatformError::Cancelled.is_retryable());
        assert!(
            !PlatformError::Unsupported {
                platform: PlatformType::Shopee,
                operation: "update_order_status",
                reason: "derived from shipment",
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_unauthorized_statuses() {
        let unauthorized = PlatformError::Http {
            status: 401,
            body: "expired".to_string(),
        };
        let server = PlatformError::Http {
            status: 500,
            body: String::new(),
        };
        assert!(unauthorized.is_unauthorized());
        assert!(!server.is_unauthorized());
        assert_eq!(unauthorized.to_string(), "HTTP 401: expired");
    }

    #[test]
    fn test_order_query_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let query = OrderQuery::default();

        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let (start, end) = query.window(now);
        assert_eq!(end, now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_order_query_offset() {
        let query = OrderQuery {
            page: Some(3),
            limit: Some(20),
            ..OrderQuery::default()
        };
        assert_eq!(query.offset(), 40);

        let zero_page = OrderQuery {
            page: Some(0),
            ..OrderQuery::default()
        };
        assert_eq!(zero_page.page(), 1);
    }
}
