//! In-process implementation of every store trait.
//!
//! Records live in one mutex-guarded state and are cloned in and out, so
//! no lock is ever held across an await point. The job store enforces the
//! job lifecycle: counters never decrease, only legal status transitions
//! are accepted, and a terminal job is never written again.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use marketsync_core::{
    CanonicalOrder, CanonicalProduct, ConnectionId, InventoryItem, ListingId, ListingUpdate,
    OrderId, OrgId, PlatformConnection, PlatformType, ProductId, ProductListing, SyncJob,
    SyncJobId, SyncJobType, SyncJobUpdate, SyncLogEntry, TokenGrant,
};

use super::{
    InventoryStore, OrderStore, PlatformConnectionStore, ProductListingStore, ProductStore,
    StoreError, StoreResult, SyncJobStore, SyncLogStore,
};

#[derive(Debug, Default)]
struct State {
    products: Vec<(OrgId, CanonicalProduct)>,
    inventory: Vec<(OrgId, InventoryItem)>,
    listings: Vec<(OrgId, ProductListing)>,
    connections: Vec<PlatformConnection>,
    jobs: HashMap<SyncJobId, SyncJob>,
    logs: Vec<(OrgId, SyncLogEntry)>,
    orders: HashMap<(ConnectionId, String), StoredOrder>,
    connections_unavailable: bool,
}

#[derive(Debug)]
struct StoredOrder {
    id: OrderId,
    org_id: OrgId,
    order: CanonicalOrder,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_product(&self, org_id: OrgId, product: CanonicalProduct) {
        self.state().products.push((org_id, product));
    }

    pub fn add_inventory(&self, org_id: OrgId, item: InventoryItem) {
        self.state().inventory.push((org_id, item));
    }

    pub fn add_listing(&self, org_id: OrgId, listing: ProductListing) {
        self.state().listings.push((org_id, listing));
    }

    pub fn add_connection(&self, connection: PlatformConnection) {
        self.state().connections.push(connection);
    }

    /// Make connection reads fail, as an unreachable backend would.
    pub fn set_connections_unavailable(&self, unavailable: bool) {
        self.state().connections_unavailable = unavailable;
    }

    #[must_use]
    pub fn listings(&self, org_id: OrgId) -> Vec<ProductListing> {
        self.state()
            .listings
            .iter()
            .filter(|(org, _)| *org == org_id)
            .map(|(_, listing)| listing.clone())
            .collect()
    }

    #[must_use]
    pub fn connection(&self, connection_id: ConnectionId) -> Option<PlatformConnection> {
        self.state()
            .connections
            .iter()
            .find(|c| c.id == connection_id)
            .cloned()
    }

    /// Jobs of `org_id`, oldest first.
    #[must_use]
    pub fn jobs(&self, org_id: OrgId) -> Vec<SyncJob> {
        let mut jobs: Vec<_> = self
            .state()
            .jobs
            .values()
            .filter(|job| job.org_id == org_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Log entries of `org_id` in append order.
    #[must_use]
    pub fn logs(&self, org_id: OrgId) -> Vec<SyncLogEntry> {
        self.state()
            .logs
            .iter()
            .filter(|(org, _)| *org == org_id)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    #[must_use]
    pub fn orders(&self, org_id: OrgId) -> Vec<CanonicalOrder> {
        self.state()
            .orders
            .values()
            .filter(|stored| stored.org_id == org_id)
            .map(|stored| stored.order.clone())
            .collect()
    }
}

fn check_job_update(job: &SyncJob, update: &SyncJobUpdate) -> StoreResult<()> {
    if job.status.is_terminal() {
        return Err(StoreError::Conflict(format!(
            "sync job {} is already {}",
            job.id, job.status
        )));
    }
    if let Some(next) = update.status
        && next != job.status
        && !job.status.can_transition_to(next)
    {
        return Err(StoreError::Conflict(format!(
            "sync job {} cannot move from {} to {next}",
            job.id, job.status
        )));
    }

    let counters = [
        ("totalItems", job.total_items, update.total_items),
        ("processedItems", job.processed_items, update.processed_items),
        ("failedItems", job.failed_items, update.failed_items),
    ];
    for (name, current, next) in counters {
        if let Some(next) = next
            && next < current
        {
            return Err(StoreError::Conflict(format!(
                "sync job {} {name} would decrease from {current} to {next}",
                job.id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn list(&self, org_id: OrgId) -> StoreResult<Vec<CanonicalProduct>> {
        Ok(self
            .state()
            .products
            .iter()
            .filter(|(org, _)| *org == org_id)
            .map(|(_, product)| product.clone())
            .collect())
    }
}

#[async_trait]
impl ProductListingStore for MemoryStore {
    async fn list_by_product(
        &self,
        org_id: OrgId,
        product_id: Option<ProductId>,
    ) -> StoreResult<Vec<ProductListing>> {
        Ok(self
            .state()
            .listings
            .iter()
            .filter(|(org, listing)| {
                *org == org_id && product_id.is_none_or(|id| listing.product_id == id)
            })
            .map(|(_, listing)| listing.clone())
            .collect())
    }

    async fn upsert(
        &self,
        org_id: OrgId,
        mut listing: ProductListing,
    ) -> StoreResult<ProductListing> {
        let mut state = self.state();
        let existing = state.listings.iter_mut().find(|(org, row)| {
            *org == org_id && row.product_id == listing.product_id && row.platform == listing.platform
        });

        if let Some((_, row)) = existing {
            listing.id = row.id;
            row.clone_from(&listing);
        } else {
            state.listings.push((org_id, listing.clone()));
        }
        Ok(listing)
    }

    async fn update(
        &self,
        org_id: OrgId,
        listing_id: ListingId,
        update: ListingUpdate,
    ) -> StoreResult<()> {
        let mut state = self.state();
        let (_, listing) = state
            .listings
            .iter_mut()
            .find(|(org, row)| *org == org_id && row.id == listing_id)
            .ok_or_else(|| StoreError::NotFound(format!("listing {listing_id}")))?;
        update.apply_to(listing);
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn list(
        &self,
        org_id: OrgId,
        product_id: Option<ProductId>,
    ) -> StoreResult<Vec<InventoryItem>> {
        Ok(self
            .state()
            .inventory
            .iter()
            .filter(|(org, item)| {
                *org == org_id && product_id.is_none_or(|id| item.product_id == id)
            })
            .map(|(_, item)| item.clone())
            .collect())
    }
}

#[async_trait]
impl PlatformConnectionStore for MemoryStore {
    async fn list(&self, org_id: OrgId) -> StoreResult<Vec<PlatformConnection>> {
        let state = self.state();
        if state.connections_unavailable {
            return Err(StoreError::Backend("connection store unavailable".to_string()));
        }
        Ok(state
            .connections
            .iter()
            .filter(|c| c.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn update_tokens(
        &self,
        org_id: OrgId,
        connection_id: ConnectionId,
        grant: &TokenGrant,
    ) -> StoreResult<()> {
        let mut state = self.state();
        let connection = state
            .connections
            .iter_mut()
            .find(|c| c.org_id == org_id && c.id == connection_id)
            .ok_or_else(|| StoreError::NotFound(format!("connection {connection_id}")))?;

        connection.access_token = Some(grant.access_token.clone());
        if let Some(refresh) = &grant.refresh_token {
            connection.refresh_token = Some(refresh.clone());
        }
        connection.token_expires_at = grant.expires_at;
        Ok(())
    }
}

#[async_trait]
impl SyncJobStore for MemoryStore {
    async fn create(
        &self,
        org_id: OrgId,
        job_type: SyncJobType,
        platform: Option<PlatformType>,
    ) -> StoreResult<SyncJob> {
        let job = SyncJob::new(org_id, job_type, platform);
        self.state().jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn update_progress(&self, job_id: SyncJobId, update: SyncJobUpdate) -> StoreResult<()> {
        let mut state = self.state();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("sync job {job_id}")))?;
        check_job_update(job, &update)?;
        update.apply_to(job);
        Ok(())
    }

    async fn get(&self, job_id: SyncJobId) -> StoreResult<SyncJob> {
        self.state()
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("sync job {job_id}")))
    }
}

#[async_trait]
impl SyncLogStore for MemoryStore {
    async fn append(&self, org_id: OrgId, entry: SyncLogEntry) -> StoreResult<()> {
        self.state().logs.push((org_id, entry));
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn upsert(&self, org_id: OrgId, order: CanonicalOrder) -> StoreResult<OrderId> {
        let mut state = self.state();
        let key = (order.connection_id, order.platform_order_id.clone());
        let stored = state.orders.entry(key).or_insert_with(|| StoredOrder {
            id: OrderId::generate(),
            org_id,
            order: order.clone(),
        });
        stored.order = order;
        Ok(stored.id)
    }
}
