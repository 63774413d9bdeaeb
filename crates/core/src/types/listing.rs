//! Products as they exist on a marketplace, and the listings that tie them
//! back to the canonical catalog.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::connection::PlatformConnection;
use super::id::{ConnectionId, ListingId, ProductId};
use super::platform::PlatformType;
use super::status::{ListingStatus, ProductStatus, SyncStatus};

/// A product in a platform's own representation, mapped into common fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformProduct {
    /// Platform-native product identifier.
    pub id: String,
    pub name: String,
    pub sku: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i64,
    pub images: Vec<String>,
    pub status: ProductStatus,
    pub url: Option<String>,
    /// Raw platform response, passed through untouched.
    pub platform_data: serde_json::Value,
}

/// The record tying one canonical product to one marketplace.
///
/// There is at most one listing per (product, platform) pair. Its sync
/// fields describe the most recent attempt only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub id: ListingId,
    pub product_id: ProductId,
    pub connection_id: Option<ConnectionId>,
    pub platform: PlatformType,
    pub platform_product_id: Option<String>,
    pub platform_url: Option<String>,
    pub listing_status: ListingStatus,
    pub platform_price: Decimal,
    pub platform_stock: i64,
    pub sync_status: SyncStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<String>,
    pub platform_data: serde_json::Value,
}

impl ProductListing {
    /// Build a listing for a product that was just pushed successfully.
    #[must_use]
    pub fn synced(
        product_id: ProductId,
        connection: &PlatformConnection,
        remote: &PlatformProduct,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ListingId::generate(),
            product_id,
            connection_id: Some(connection.id),
            platform: connection.platform,
            platform_product_id: Some(remote.id.clone()),
            platform_url: remote.url.clone(),
            listing_status: remote.status.into(),
            platform_price: remote.price,
            platform_stock: remote.stock,
            sync_status: SyncStatus::Synced,
            last_sync_at: Some(now),
            last_sync_error: None,
            platform_data: remote.platform_data.clone(),
        }
    }

    /// The platform-native id, if the product has been created remotely.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        self.platform_product_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

/// A partial listing update; `None` leaves the field untouched.
///
/// Nullable columns use `Option<Option<T>>` so they can be cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingUpdate {
    pub platform_product_id: Option<String>,
    pub platform_url: Option<Option<String>>,
    pub listing_status: Option<ListingStatus>,
    pub platform_price: Option<Decimal>,
    pub platform_stock: Option<i64>,
    pub sync_status: Option<SyncStatus>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_error: Option<Option<String>>,
    pub platform_data: Option<serde_json::Value>,
}

impl ListingUpdate {
    /// Record a successful push of `remote`.
    #[must_use]
    pub fn synced(remote: &PlatformProduct, now: DateTime<Utc>) -> Self {
        Self {
            platform_product_id: Some(remote.id.clone()),
            platform_url: Some(remote.url.clone()),
            listing_status: Some(remote.status.into()),
            platform_price: Some(remote.price),
            platform_stock: Some(remote.stock),
            sync_status: Some(SyncStatus::Synced),
            last_sync_at: Some(now),
            last_sync_error: Some(None),
            platform_data: Some(remote.platform_data.clone()),
        }
    }

    /// Record a successful stock push.
    #[must_use]
    pub fn stock_pushed(stock: i64, now: DateTime<Utc>) -> Self {
        Self {
            platform_stock: Some(stock),
            sync_status: Some(SyncStatus::Synced),
            last_sync_at: Some(now),
            last_sync_error: Some(None),
            ..Self::default()
        }
    }

    /// Record a failed attempt.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            sync_status: Some(SyncStatus::Failed),
            last_sync_error: Some(Some(error.into())),
            ..Self::default()
        }
    }

    /// Apply this update to a listing in place.
    pub fn apply_to(&self, listing: &mut ProductListing) {
        if let Some(id) = &self.platform_product_id {
            listing.platform_product_id = Some(id.clone());
        }
        if let Some(url) = &self.platform_url {
            listing.platform_url.clone_from(url);
        }
        if let Some(status) = self.listing_status {
            listing.listing_status = status;
        }
        if let Some(price) = self.platform_price {
            listing.platform_price = price;
        }
        if let Some(stock) = self.platform_stock {
            listing.platform_stock = stock;
        }
        if let Some(status) = self.sync_status {
            listing.sync_status = status;
        }
        if let Some(at) = self.last_sync_at {
            listing.last_sync_at = Some(at);
        }
        if let Some(error) = &self.last_sync_error {
            listing.last_sync_error.clone_from(error);
        }
        if let Some(data) = &self.platform_data {
            listing.platform_data = data.clone();
        }
    }
}
