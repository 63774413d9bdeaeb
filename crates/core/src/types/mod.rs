//! Core types for marketsync.
//!
//! This module provides type-safe wrappers and records for the catalog,
//! marketplace and sync-job concepts shared by every component.

pub mod catalog;
pub mod connection;
pub mod credential;
pub mod currency;
pub mod id;
pub mod listing;
pub mod order;
pub mod platform;
pub mod status;
pub mod sync;

pub use catalog::{CanonicalProduct, InventoryItem, ProductUpdate};
pub use connection::{PlatformConnection, SyncSettings, TokenGrant};
pub use credential::{
    CredentialError, MomoCredentials, PlatformCredentials, RawCredentials, ShopeeCredentials,
    ShoplineCredentials,
};
pub use currency::CurrencyCode;
pub use id::*;
pub use listing::{ListingUpdate, PlatformProduct, ProductListing};
pub use order::{CanonicalOrder, OrderLineItem, PlatformOrder, ShippingAddress};
pub use platform::PlatformType;
pub use status::*;
pub use sync::{EntityType, SyncAction, SyncJob, SyncJobUpdate, SyncLogEntry, SyncProgress};
