//! marketsync - multi-marketplace platform adapters and sync engine.
//!
//! Keeps a merchant's catalog, stock and orders in step with the
//! marketplaces they sell on (Shopee, momo, SHOPLINE).
//!
//! # Architecture
//!
//! ```text
//! SyncService ─▶ ClientFactory ─▶ PlatformAdapter ─▶ RequestExecutor ─▶ HttpTransport
//!      │                           (sign, map)        (limit, retry)      (reqwest)
//!      ▼
//!  store traits (products, listings, inventory, connections, jobs, logs, orders)
//! ```
//!
//! # Modules
//!
//! - [`config`] - Environment-driven configuration
//! - [`http`] - Transport, rate limiter and retrying executor
//! - [`platform`] - The adapter trait, one client per marketplace, and the factory
//! - [`store`] - Persistence traits and the in-memory store
//! - [`sync`] - The sync service, its worker pool and job tracking
//! - [`error`] - Sync errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod http;
pub mod platform;
pub mod store;
pub mod sync;

pub use config::{ConfigError, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use platform::{
    ClientFactory, OrderQuery, PlatformAdapter, PlatformClientFactory, PlatformError,
    PlatformResult, test_platform_connection,
};
pub use store::{MemoryStore, StoreError, SyncStores};
pub use sync::{ProductPushReport, SyncOptions, SyncService};
