//! Shared harness for the marketsync end-to-end tests.
//!
//! The tests in `tests/` drive the real platform clients and the sync
//! service against a [`ScriptedTransport`] instead of live marketplaces.
//! Every request the clients make is recorded, so a test can assert both
//! on the sync outcome and on what went over the wire.
//!
//! Run with: `cargo test -p marketsync-integration-tests`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::{Arc, Once};
use std::time::Duration;

use marketsync::config::{OrderSyncConfig, PlatformEndpoint};
use marketsync::http::testing;
use marketsync::http::{RateLimitConfig, RequestExecutor};
use marketsync::store::fixtures;
use marketsync::{MemoryStore, PlatformClientFactory, SyncConfig, SyncService, SyncStores};
use marketsync_core::{CanonicalProduct, OrgId, PlatformConnection, PlatformType};
use rust_decimal::Decimal;

pub use marketsync::http::testing::{ScriptedTransport, fast_retry};
pub use marketsync::store::fixtures::connection;

/// Send engine logs to the test output, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "marketsync=debug".into());
        // Another harness may already have installed a global subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub const SHOPEE_URL: &str = "https://shopee.test";
pub const MOMO_URL: &str = "https://momo.test";
pub const SHOPLINE_URL: &str = "https://shopline.test";

/// Engine configuration pointing every platform at a test host.
#[must_use]
pub fn config() -> SyncConfig {
    let endpoint = |base_url: &str| PlatformEndpoint {
        base_url: base_url.to_string(),
        rate_limit: RateLimitConfig::per_minute(10_000),
    };
    SyncConfig {
        concurrency: 4,
        retry: fast_retry(),
        http_timeout: Duration::from_secs(5),
        orders: OrderSyncConfig::default(),
        shopee: endpoint(SHOPEE_URL),
        momo: endpoint(MOMO_URL),
        shopline: endpoint(SHOPLINE_URL),
    }
}

/// Executor over `transport` with [`fast_retry`].
#[must_use]
pub fn executor(platform: PlatformType, transport: Arc<ScriptedTransport>) -> RequestExecutor {
    testing::executor(platform, transport, fast_retry())
}

/// A priced, active catalog product.
#[must_use]
pub fn product(sku: &str, price: i64) -> CanonicalProduct {
    CanonicalProduct {
        name: format!("Product {sku}"),
        description: format!("Description of {sku}"),
        base_price: Decimal::from(price),
        images: vec![format!("https://cdn.example.com/{sku}.jpg")],
        ..fixtures::product(sku)
    }
}

/// One organization's data in a [`MemoryStore`], wired to a scripted
/// transport through the real client factory.
pub struct World {
    pub org_id: OrgId,
    pub store: Arc<MemoryStore>,
    pub transport: Arc<ScriptedTransport>,
    pub config: SyncConfig,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        init_tracing();
        Self {
            org_id: OrgId::generate(),
            store: Arc::new(MemoryStore::new()),
            transport: ScriptedTransport::new(),
            config: config(),
        }
    }

    /// Store a connected shop for `platform`.
    #[must_use]
    pub fn connect(&self, platform: PlatformType) -> PlatformConnection {
        let connection = connection(self.org_id, platform);
        self.store.add_connection(connection.clone());
        connection
    }

    /// Store a connection whose authorization was revoked.
    #[must_use]
    pub fn disconnected(&self, platform: PlatformType) -> PlatformConnection {
        let connection = PlatformConnection {
            is_connected: false,
            ..connection(self.org_id, platform)
        };
        self.store.add_connection(connection.clone());
        connection
    }

    /// Store a catalog product.
    #[must_use]
    pub fn product(&self, sku: &str, price: i64) -> CanonicalProduct {
        let product = product(sku, price);
        self.store.add_product(self.org_id, product.clone());
        product
    }

    /// Store `available` units of `product`.
    pub fn stock(&self, product: &CanonicalProduct, available: i64) {
        self.store
            .add_inventory(self.org_id, fixtures::inventory(product, available));
    }

    #[must_use]
    pub fn factory(&self) -> PlatformClientFactory {
        PlatformClientFactory::new(self.transport.clone(), self.config.clone())
    }

    /// A sync service for this world's organization.
    #[must_use]
    pub fn service(&self) -> SyncService {
        SyncService::new(
            self.org_id,
            SyncStores::from_backend(Arc::clone(&self.store)),
            Arc::new(self.factory()),
            (&self.config).into(),
        )
    }
}
