//! Persistence seams for the sync service.
//!
//! The engine never talks to a database directly. Each kind of record the
//! sync service reads or writes has its own trait here, scoped by
//! organization; a host application implements them over its own storage.
//! [`MemoryStore`] implements all of them in-process.
//!
//! # Records
//!
//! - products and inventory - read only
//! - product listings - one per product and platform, upserted on push
//! - platform connections - read, tokens updated after a refresh
//! - sync jobs - created, then progress updated by a single writer
//! - sync logs - append only
//! - orders - upserted by `(connection, platform order id)`

#[cfg(any(test, feature = "testing"))]
pub mod fixtures;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use marketsync_core::{
    CanonicalOrder, CanonicalProduct, ConnectionId, InventoryItem, ListingId, ListingUpdate,
    OrderId, OrgId, PlatformConnection, PlatformType, ProductId, ProductListing, SyncJob,
    SyncJobId, SyncJobType, SyncJobUpdate, SyncLogEntry, TokenGrant,
};
use thiserror::Error;

pub use memory::MemoryStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested record was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The write would break a record invariant.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list(&self, org_id: OrgId) -> StoreResult<Vec<CanonicalProduct>>;

    /// One product by id.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the organization has no such product.
    async fn get(&self, org_id: OrgId, product_id: ProductId) -> StoreResult<CanonicalProduct> {
        self.list(org_id)
            .await?
            .into_iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))
    }
}

#[async_trait]
pub trait ProductListingStore: Send + Sync {
    /// Listings of one product, or of every product when `product_id` is `None`.
    async fn list_by_product(
        &self,
        org_id: OrgId,
        product_id: Option<ProductId>,
    ) -> StoreResult<Vec<ProductListing>>;

    /// Insert `listing`, or replace the existing row for the same product
    /// and platform, keeping that row's id. Returns the stored row.
    async fn upsert(&self, org_id: OrgId, listing: ProductListing) -> StoreResult<ProductListing>;

    async fn update(
        &self,
        org_id: OrgId,
        listing_id: ListingId,
        update: ListingUpdate,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Inventory rows of one product, or all rows when `product_id` is `None`.
    async fn list(
        &self,
        org_id: OrgId,
        product_id: Option<ProductId>,
    ) -> StoreResult<Vec<InventoryItem>>;
}

#[async_trait]
pub trait PlatformConnectionStore: Send + Sync {
    async fn list(&self, org_id: OrgId) -> StoreResult<Vec<PlatformConnection>>;

    /// Replace the stored tokens after a refresh.
    async fn update_tokens(
        &self,
        org_id: OrgId,
        connection_id: ConnectionId,
        grant: &TokenGrant,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait SyncJobStore: Send + Sync {
    /// Create a pending job.
    async fn create(
        &self,
        org_id: OrgId,
        job_type: SyncJobType,
        platform: Option<PlatformType>,
    ) -> StoreResult<SyncJob>;

    /// Apply `update` to the job.
    ///
    /// # Errors
    ///
    /// `StoreError::Conflict` if the update moves the status backwards or
    /// out of a terminal state.
    async fn update_progress(&self, job_id: SyncJobId, update: SyncJobUpdate) -> StoreResult<()>;

    async fn get(&self, job_id: SyncJobId) -> StoreResult<SyncJob>;
}

#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn append(&self, org_id: OrgId, entry: SyncLogEntry) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert or update the order identified by its connection and
    /// platform order id.
    async fn upsert(&self, org_id: OrgId, order: CanonicalOrder) -> StoreResult<OrderId>;
}

/// Every store the sync service needs.
#[derive(Clone)]
pub struct SyncStores {
    pub products: Arc<dyn ProductStore>,
    pub listings: Arc<dyn ProductListingStore>,
    pub inventory: Arc<dyn InventoryStore>,
    pub connections: Arc<dyn PlatformConnectionStore>,
    pub jobs: Arc<dyn SyncJobStore>,
    pub logs: Arc<dyn SyncLogStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl SyncStores {
    /// Use one backend for every record kind.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: ProductStore
            + ProductListingStore
            + InventoryStore
            + PlatformConnectionStore
            + SyncJobStore
            + SyncLogStore
            + OrderStore
            + 'static,
    {
        Self {
            products: backend.clone(),
            listings: backend.clone(),
            inventory: backend.clone(),
            connections: backend.clone(),
            jobs: backend.clone(),
            logs: backend.clone(),
            orders: backend,
        }
    }
}

impl std::fmt::Debug for SyncStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncStores").finish_non_exhaustive()
    }
}
