use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use marketsync_core::{
    CanonicalOrder, CanonicalProduct, ConnectionId, CredentialError, EntityType, InventoryItem,
    ListingUpdate, OrgId, PlatformConnection, PlatformOrder, PlatformProduct, PlatformType,
    ProductId, ProductListing, ProductUpdate, SyncAction, SyncJobId, SyncJobType, SyncLogEntry,
    SyncProgress,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::tracker::{JobTracker, ProgressReporter};
use crate::config::{OrderSyncConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::platform::{ClientFactory, OrderQuery, PlatformAdapter};
use crate::store::SyncStores;

/// Orchestration knobs taken from [`SyncConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Connections worked on at once
    pub concurrency: usize,
    pub orders: OrderSyncConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            orders: config.orders,
        }
    }
}

/// Outcome of [`SyncService::sync_product_to_platforms`].
#[derive(Debug)]
pub struct ProductPushReport {
    /// Final state of the `product_push` job.
    pub progress: SyncProgress,
    /// One entry per requested connection.
    pub results: HashMap<ConnectionId, SyncResult<PlatformProduct>>,
    /// `"{platform}: {error}"` for every failed connection.
    pub errors: Vec<String>,
}

impl ProductPushReport {
    /// Connections the product was pushed to.
    pub fn succeeded(&self) -> impl Iterator<Item = &ConnectionId> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(id, _)| id)
    }
}

/// Orchestrates sync operations for one organization.
///
/// Item and connection failures are recorded on the job, the sync log and
/// the affected listing; they never abort the run. A run only ends
/// `failed` when its inputs cannot be read or it is cancelled, and only a
/// failure to create the job record itself is returned as `Err`.
pub struct SyncService {
    org_id: OrgId,
    stores: SyncStores,
    clients: Arc<dyn ClientFactory>,
    options: SyncOptions,
    cancel: CancellationToken,
}

impl SyncService {
    #[must_use]
    pub fn new(
        org_id: OrgId,
        stores: SyncStores,
        clients: Arc<dyn ClientFactory>,
        options: SyncOptions,
    ) -> Self {
        Self {
            org_id,
            stores,
            clients,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop runs when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts in-flight runs.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Push one product to each of `connection_ids`.
    ///
    /// Connections are deduplicated. A product that already has a remote
    /// id on a connection's platform is updated there, otherwise created.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` only if the job record cannot be created or started.
    #[instrument(skip(self, connection_ids), fields(org_id = %self.org_id, targets = connection_ids.len()))]
    pub async fn sync_product_to_platforms(
        &self,
        product_id: ProductId,
        connection_ids: &[ConnectionId],
    ) -> SyncResult<ProductPushReport> {
        let tracker = self.start(SyncJobType::ProductPush, None).await?;

        let mut targets: Vec<ConnectionId> = Vec::with_capacity(connection_ids.len());
        for id in connection_ids {
            if !targets.contains(id) {
                targets.push(*id);
            }
        }

        let (product, connections, listings) = match self.load_push_inputs(product_id).await {
            Ok(inputs) => inputs,
            Err(err) => {
                let progress = self.finish(tracker, Err(err)).await;
                return Ok(ProductPushReport {
                    errors: progress.errors.clone(),
                    results: HashMap::new(),
                    progress,
                });
            }
        };

        let worker = self.worker(&tracker);
        worker.reporter.discovered(count(targets.len()));

        let product = Arc::new(product);
        let tasks: Vec<_> = targets
            .into_iter()
            .map(|id| {
                let connection = connections.iter().find(|c| c.id == id).cloned();
                let existing = connection.as_ref().and_then(|c| {
                    listings
                        .iter()
                        .find(|listing| listing.platform == c.platform)
                        .cloned()
                });
                (id, connection, existing)
            })
            .collect();

        let outcomes = bounded(self.options.concurrency, tasks, |(id, connection, existing)| {
            let worker = worker.clone();
            let product = Arc::clone(&product);
            async move {
                let result = worker.push_product(&product, id, connection, existing).await;
                (id, result)
            }
        })
        .await;
        drop(worker);

        let results: HashMap<_, _> = outcomes.into_iter().collect();
        let progress = self.finish(tracker, Ok(())).await;
        Ok(ProductPushReport {
            errors: progress.errors.clone(),
            results,
            progress,
        })
    }

    /// Push available stock for every inventory item, or one product's
    /// items, to every connection with inventory sync enabled.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` only if the job record cannot be created or started.
    #[instrument(skip(self), fields(org_id = %self.org_id))]
    pub async fn sync_inventory(&self, product_id: Option<ProductId>) -> SyncResult<SyncProgress> {
        let tracker = self.start(SyncJobType::InventorySync, None).await?;
        let worker = self.worker(&tracker);
        let outcome = self.inventory_phase(&worker, product_id).await;
        drop(worker);
        Ok(self.finish(tracker, outcome).await)
    }

    /// Import orders placed between `start` and `end` from every
    /// connection with order sync enabled, optionally only on `platform`.
    ///
    /// Without dates the window is the configured lookback ending now.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` only if the job record cannot be created or started.
    #[instrument(skip(self), fields(org_id = %self.org_id))]
    pub async fn sync_orders(
        &self,
        platform: Option<PlatformType>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> SyncResult<SyncProgress> {
        let tracker = self.start(SyncJobType::OrderSync, platform).await?;
        let worker = self.worker(&tracker);
        let outcome = self.orders_phase(&worker, platform, start, end).await;
        drop(worker);
        Ok(self.finish(tracker, outcome).await)
    }

    /// Inventory then orders under one job, with their counts summed.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Store` only if the job record cannot be created or started.
    #[instrument(skip(self), fields(org_id = %self.org_id))]
    pub async fn full_sync(&self) -> SyncResult<SyncProgress> {
        let tracker = self.start(SyncJobType::FullSync, None).await?;
        let worker = self.worker(&tracker);
        let outcome = self.full_phases(&worker).await;
        drop(worker);
        Ok(self.finish(tracker, outcome).await)
    }

    async fn full_phases(&self, worker: &Worker) -> SyncResult<()> {
        self.inventory_phase(worker, None).await?;
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        self.orders_phase(worker, None, None, None).await
    }

    async fn start(
        &self,
        job_type: SyncJobType,
        platform: Option<PlatformType>,
    ) -> SyncResult<JobTracker> {
        Ok(JobTracker::start(Arc::clone(&self.stores.jobs), self.org_id, job_type, platform).await?)
    }

    fn worker(&self, tracker: &JobTracker) -> Worker {
        Worker {
            org_id: self.org_id,
            job_id: tracker.job_id(),
            stores: self.stores.clone(),
            clients: Arc::clone(&self.clients),
            cancel: self.cancel.clone(),
            reporter: tracker.reporter(),
        }
    }

    /// Write the terminal state. Cancellation wins over a clean outcome.
    async fn finish(&self, tracker: JobTracker, outcome: SyncResult<()>) -> SyncProgress {
        let failure = match outcome {
            Ok(()) if self.cancel.is_cancelled() => Some(SyncError::Cancelled.to_string()),
            Ok(()) => None,
            Err(err) => Some(err.to_string()),
        };
        tracker.finish(failure).await
    }

    async fn load_push_inputs(
        &self,
        product_id: ProductId,
    ) -> SyncResult<(CanonicalProduct, Vec<PlatformConnection>, Vec<ProductListing>)> {
        let product = self.stores.products.get(self.org_id, product_id).await?;
        let connections = self.stores.connections.list(self.org_id).await?;
        let listings = self
            .stores
            .listings
            .list_by_product(self.org_id, Some(product_id))
            .await?;
        Ok((product, connections, listings))
    }

    async fn inventory_phase(
        &self,
        worker: &Worker,
        product_id: Option<ProductId>,
    ) -> SyncResult<()> {
        let items = self.stores.inventory.list(self.org_id, product_id).await?;
        let listings = self
            .stores
            .listings
            .list_by_product(self.org_id, product_id)
            .await?;
        let connections: Vec<_> = self
            .stores
            .connections
            .list(self.org_id)
            .await?
            .into_iter()
            .filter(|c| c.is_connected && c.sync_settings.sync_inventory)
            .collect();

        info!(
            items = items.len(),
            connections = connections.len(),
            "Pushing inventory"
        );
        worker
            .reporter
            .discovered(count(items.len()).saturating_mul(count(connections.len())));

        let items = Arc::new(items);
        let listings = Arc::new(listings);
        bounded(self.options.concurrency, connections, |connection| {
            let worker = worker.clone();
            let items = Arc::clone(&items);
            let listings = Arc::clone(&listings);
            async move { worker.push_stock(&connection, &items, &listings).await }
        })
        .await;
        Ok(())
    }

    async fn orders_phase(
        &self,
        worker: &Worker,
        platform: Option<PlatformType>,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> SyncResult<()> {
        let connections: Vec<_> = self
            .stores
            .connections
            .list(self.org_id)
            .await?
            .into_iter()
            .filter(|c| {
                c.is_connected
                    && c.sync_settings.sync_orders
                    && platform.is_none_or(|p| c.platform == p)
            })
            .collect();

        let settings = self.options.orders;
        let (start, end) = order_window(start, end, settings.lookback_days)?;
        info!(connections = connections.len(), %start, %end, "Pulling orders");

        bounded(self.options.concurrency, connections, |connection| {
            let worker = worker.clone();
            async move { worker.pull_orders(&connection, start, end, settings).await }
        })
        .await;
        Ok(())
    }
}

/// Resolve the pull window, defaulting to `lookback_days` before now.
fn order_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    lookback_days: i64,
) -> SyncResult<(DateTime<Utc>, DateTime<Utc>)> {
    let end = end.unwrap_or_else(Utc::now);
    let start = match start {
        Some(start) => start,
        None => Duration::try_days(lookback_days)
            .filter(|lookback| *lookback > Duration::zero())
            .and_then(|lookback| end.checked_sub_signed(lookback))
            .ok_or_else(|| {
                SyncError::InvalidOrderWindow(format!("lookback of {lookback_days} days"))
            })?,
    };
    if start > end {
        return Err(SyncError::InvalidOrderWindow(format!("{start} is after {end}")));
    }
    Ok((start, end))
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("org_id", &self.org_id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Everything a pool task needs, owned so it can be moved into the task.
#[derive(Clone)]
struct Worker {
    org_id: OrgId,
    job_id: SyncJobId,
    stores: SyncStores,
    clients: Arc<dyn ClientFactory>,
    cancel: CancellationToken,
    reporter: ProgressReporter,
}

impl Worker {
    fn client(
        &self,
        connection: &PlatformConnection,
    ) -> Result<Arc<dyn PlatformAdapter>, CredentialError> {
        self.clients.client_for(connection, &self.cancel)
    }

    /// Append to the sync log. Failures are logged and swallowed.
    async fn log(&self, entry: SyncLogEntry) {
        let entry = entry.for_job(self.job_id);
        if let Err(err) = self.stores.logs.append(self.org_id, entry).await {
            warn!(job_id = %self.job_id, error = %err, "Failed to write sync log");
        }
    }

    async fn push_product(
        &self,
        product: &CanonicalProduct,
        connection_id: ConnectionId,
        connection: Option<PlatformConnection>,
        existing: Option<ProductListing>,
    ) -> SyncResult<PlatformProduct> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let Some(connection) = connection else {
            let err = SyncError::UnknownConnection(connection_id);
            self.reporter.failed(format!("{connection_id}: {err}"));
            return Err(err);
        };
        let platform = connection.platform;
        if !connection.is_connected {
            let err = SyncError::NotConnected(connection_id);
            self.reporter.failed(format!("{platform}: {err}"));
            return Err(err);
        }

        let remote_id = existing.as_ref().and_then(ProductListing::remote_id);
        let action = if remote_id.is_some() {
            SyncAction::UpdateProduct
        } else {
            SyncAction::CreateProduct
        };

        let result = self.try_push(product, &connection, existing.as_ref()).await;

        match &result {
            Ok(remote) => {
                debug!(connection = %connection.label(), remote_id = %remote.id, %action, "Product pushed");
                self.log(
                    SyncLogEntry::success(platform, action, EntityType::Product, product.id.to_string())
                        .with_message(format!("Product synced successfully to {platform}")),
                )
                .await;
                self.reporter.succeeded();
            }
            Err(err) => {
                error!(connection = %connection.label(), error = %err, %action, "Product push failed");
                if let Some(listing) = &existing
                    && let Err(store_err) = self
                        .stores
                        .listings
                        .update(self.org_id, listing.id, ListingUpdate::failed(err.to_string()))
                        .await
                {
                    warn!(listing_id = %listing.id, error = %store_err, "Failed to record push failure");
                }
                self.log(SyncLogEntry::error(
                    platform,
                    action,
                    EntityType::Product,
                    product.id.to_string(),
                    err.to_string(),
                ))
                .await;
                self.reporter.failed(format!("{platform}: {err}"));
            }
        }
        result
    }

    async fn try_push(
        &self,
        product: &CanonicalProduct,
        connection: &PlatformConnection,
        existing: Option<&ProductListing>,
    ) -> SyncResult<PlatformProduct> {
        let client = self.client(connection)?;
        let remote = match existing.and_then(ProductListing::remote_id) {
            Some(remote_id) => {
                client
                    .update_product(remote_id, &ProductUpdate::from(product))
                    .await?
            }
            None => client.create_product(product).await?,
        };
        let now = Utc::now();
        match existing {
            Some(listing) => {
                self.stores
                    .listings
                    .update(self.org_id, listing.id, ListingUpdate::synced(&remote, now))
                    .await?;
            }
            None => {
                let listing = ProductListing::synced(product.id, connection, &remote, now);
                self.stores.listings.upsert(self.org_id, listing).await?;
            }
        }
        Ok(remote)
    }

    /// Push every item's stock to one connection.
    async fn push_stock(
        &self,
        connection: &PlatformConnection,
        items: &[InventoryItem],
        listings: &[ProductListing],
    ) {
        let platform = connection.platform;
        let client = match self.client(connection) {
            Ok(client) => client,
            Err(err) => {
                error!(connection = %connection.label(), error = %err, "Cannot build client");
                self.reporter
                    .failed_many(count(items.len()), format!("{platform}: {err}"));
                return;
            }
        };

        for item in items {
            if self.cancel.is_cancelled() {
                debug!(connection = %connection.label(), "Stock push cancelled");
                return;
            }

            let target = listings
                .iter()
                .find(|l| l.product_id == item.product_id && l.platform == platform)
                .and_then(|l| l.remote_id().map(|remote_id| (l.id, remote_id)));
            let Some((listing_id, remote_id)) = target else {
                debug!(sku = %item.sku, %platform, "Not listed, skipping");
                self.reporter.succeeded();
                continue;
            };

            match client.update_stock(remote_id, item.available_stock).await {
                Ok(()) => {
                    let update = ListingUpdate::stock_pushed(item.available_stock, Utc::now());
                    if let Err(err) = self.stores.listings.update(self.org_id, listing_id, update).await {
                        warn!(listing_id = %listing_id, error = %err, "Failed to record stock push");
                    }
                    self.log(SyncLogEntry::success(
                        platform,
                        SyncAction::UpdateStock,
                        EntityType::Inventory,
                        item.sku.clone(),
                    ))
                    .await;
                    self.reporter.succeeded();
                }
                Err(err) => {
                    warn!(sku = %item.sku, connection = %connection.label(), error = %err, "Stock push failed");
                    self.log(SyncLogEntry::error(
                        platform,
                        SyncAction::UpdateStock,
                        EntityType::Inventory,
                        item.sku.clone(),
                        err.to_string(),
                    ))
                    .await;
                    self.reporter.failed(format!("{platform}/{}: {err}", item.sku));
                }
            }
        }
    }

    /// Page through one connection's orders and import them.
    async fn pull_orders(
        &self,
        connection: &PlatformConnection,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        settings: OrderSyncConfig,
    ) {
        let platform = connection.platform;
        let client = match self.client(connection) {
            Ok(client) => client,
            Err(err) => {
                error!(connection = %connection.label(), error = %err, "Cannot build client");
                self.reporter.error(format!("{platform}: {err}"));
                return;
            }
        };

        let page_size = settings.page_size.max(1);
        let mut refreshed = false;
        for page in 1..=settings.max_pages.max(1) {
            if self.cancel.is_cancelled() {
                debug!(connection = %connection.label(), "Order pull cancelled");
                return;
            }

            let query = OrderQuery {
                page: Some(page),
                limit: Some(page_size),
                status: None,
                start: Some(start),
                end: Some(end),
            };
            let orders = match self
                .fetch_orders(connection, client.as_ref(), &query, &mut refreshed)
                .await
            {
                Ok(orders) => orders,
                Err(err) => {
                    warn!(connection = %connection.label(), page, error = %err, "Order pull failed");
                    self.reporter.error(format!("{platform}: {err}"));
                    return;
                }
            };

            let fetched = orders.len();
            debug!(connection = %connection.label(), page, fetched, "Fetched orders");
            self.reporter.discovered(count(fetched));
            for order in orders {
                self.import_order(connection, order).await;
            }

            if count(fetched) < u64::from(page_size) {
                return;
            }
        }
        debug!(connection = %connection.label(), max_pages = settings.max_pages, "Order page cap reached");
    }

    /// Fetch a page, refreshing the token once if the platform rejects it.
    async fn fetch_orders(
        &self,
        connection: &PlatformConnection,
        client: &dyn PlatformAdapter,
        query: &OrderQuery,
        refreshed: &mut bool,
    ) -> SyncResult<Vec<PlatformOrder>> {
        match client.get_orders(query).await {
            Err(err) if err.is_unauthorized() && !*refreshed => {
                *refreshed = true;
                info!(connection = %connection.label(), error = %err, "Token rejected, refreshing");
                self.refresh_tokens(connection, client).await?;
                Ok(client.get_orders(query).await?)
            }
            result => Ok(result?),
        }
    }

    async fn refresh_tokens(
        &self,
        connection: &PlatformConnection,
        client: &dyn PlatformAdapter,
    ) -> SyncResult<()> {
        let platform = connection.platform;
        let grant = match client.refresh_token().await {
            Ok(grant) => grant,
            Err(err) => {
                self.log(SyncLogEntry::error(
                    platform,
                    SyncAction::RefreshToken,
                    EntityType::Connection,
                    connection.id.to_string(),
                    err.to_string(),
                ))
                .await;
                return Err(err.into());
            }
        };

        self.stores
            .connections
            .update_tokens(self.org_id, connection.id, &grant)
            .await?;
        self.log(SyncLogEntry::success(
            platform,
            SyncAction::RefreshToken,
            EntityType::Connection,
            connection.id.to_string(),
        ))
        .await;
        Ok(())
    }

    async fn import_order(&self, connection: &PlatformConnection, order: PlatformOrder) {
        let platform = connection.platform;
        let number = order.order_number.clone();
        let canonical = CanonicalOrder::from_platform(platform, connection.id, order);
        let platform_order_id = canonical.platform_order_id.clone();

        match self.stores.orders.upsert(self.org_id, canonical).await {
            Ok(order_id) => {
                debug!(%order_id, order_number = %number, "Order imported");
                self.log(
                    SyncLogEntry::success(
                        platform,
                        SyncAction::ImportOrder,
                        EntityType::Order,
                        platform_order_id,
                    )
                    .with_message(format!("Imported order {number}")),
                )
                .await;
                self.reporter.succeeded();
            }
            Err(err) => {
                warn!(order_number = %number, error = %err, "Order import failed");
                self.log(SyncLogEntry::error(
                    platform,
                    SyncAction::ImportOrder,
                    EntityType::Order,
                    platform_order_id,
                    err.to_string(),
                ))
                .await;
                self.reporter.failed(format!("{platform}/{number}: {err}"));
            }
        }
    }
}

/// Run `work` over `inputs` with at most `concurrency` tasks in flight.
///
/// Results come back in completion order. A panicked task is logged and
/// contributes no result.
async fn bounded<I, F, Fut>(concurrency: usize, inputs: Vec<I>, work: F) -> Vec<Fut::Output>
where
    F: Fn(I) -> Fut,
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for input in inputs {
        let semaphore = Arc::clone(&semaphore);
        let task = work(input);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            Some(task.await)
        });
    }

    let mut outputs = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(output)) => outputs.push(output),
            Ok(None) => warn!("Worker pool closed before a task ran"),
            Err(err) => error!(error = %err, "Sync worker panicked"),
        }
    }
    outputs
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use marketsync_core::{OrderStatus, SyncJobStatus, SyncLogStatus, SyncStatus, TokenGrant};
    use rust_decimal::Decimal;
    use secrecy::{ExposeSecret, SecretString};

    use super::*;
    use crate::platform::{PlatformError, PlatformResult};
    use crate::store::{MemoryStore, fixtures};

    #[derive(Default)]
    struct FakeAdapter {
        platform: Option<PlatformType>,
        calls: Mutex<Vec<String>>,
        fail_writes: bool,
        failing_stock: Vec<String>,
        orders: Vec<PlatformOrder>,
        reject_token_once: AtomicBool,
    }

    impl FakeAdapter {
        fn new(platform: PlatformType) -> Self {
            Self {
                platform: Some(platform),
                ..Self::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn boom() -> PlatformError {
            PlatformError::Http {
                status: 500,
                body: "boom".to_string(),
            }
        }

        fn unsupported(&self, operation: &'static str) -> PlatformError {
            PlatformError::Unsupported {
                platform: self.platform(),
                operation,
                reason: "not scripted",
            }
        }
    }

    #[async_trait]
    impl PlatformAdapter for FakeAdapter {
        fn platform(&self) -> PlatformType {
            self.platform.unwrap_or(PlatformType::Shopee)
        }

        async fn refresh_token(&self) -> PlatformResult<TokenGrant> {
            self.record("refresh".to_string());
            Ok(TokenGrant {
                access_token: SecretString::from("fresh-token".to_string()),
                refresh_token: None,
                expires_at: None,
            })
        }

        async fn get_products(
            &self,
            _page: Option<u32>,
            _limit: Option<u32>,
        ) -> PlatformResult<Vec<PlatformProduct>> {
            Err(self.unsupported("get_products"))
        }

        async fn get_product(&self, _id: &str) -> PlatformResult<PlatformProduct> {
            Err(self.unsupported("get_product"))
        }

        async fn create_product(
            &self,
            product: &CanonicalProduct,
        ) -> PlatformResult<PlatformProduct> {
            self.record(format!("create:{}", product.sku));
            if self.fail_writes {
                return Err(Self::boom());
            }
            Ok(fixtures::remote("new-1", 0))
        }

        async fn update_product(
            &self,
            id: &str,
            _update: &ProductUpdate,
        ) -> PlatformResult<PlatformProduct> {
            self.record(format!("update:{id}"));
            if self.fail_writes {
                return Err(Self::boom());
            }
            Ok(fixtures::remote(id, 0))
        }

        async fn delete_product(&self, _id: &str) -> PlatformResult<()> {
            Err(self.unsupported("delete_product"))
        }

        async fn update_stock(&self, id: &str, stock: i64) -> PlatformResult<()> {
            self.record(format!("stock:{id}={stock}"));
            if self.failing_stock.iter().any(|failing| failing == id) {
                return Err(Self::boom());
            }
            Ok(())
        }

        async fn update_price(&self, _id: &str, _price: Decimal) -> PlatformResult<()> {
            Err(self.unsupported("update_price"))
        }

        async fn get_orders(&self, query: &OrderQuery) -> PlatformResult<Vec<PlatformOrder>> {
            self.record(format!("orders:{}", query.page()));
            if self.reject_token_once.swap(false, Ordering::SeqCst) {
                return Err(PlatformError::Http {
                    status: 401,
                    body: "token expired".to_string(),
                });
            }
            let offset = usize::try_from(query.offset()).unwrap();
            let limit = usize::try_from(query.limit()).unwrap();
            Ok(self.orders.iter().skip(offset).take(limit).cloned().collect())
        }

        async fn get_order(&self, _id: &str) -> PlatformResult<PlatformOrder> {
            Err(self.unsupported("get_order"))
        }

        async fn update_order_status(&self, _id: &str, _status: OrderStatus) -> PlatformResult<()> {
            Err(self.unsupported("update_order_status"))
        }

        async fn update_shipping(
            &self,
            _id: &str,
            _tracking: &str,
            _carrier: Option<&str>,
        ) -> PlatformResult<()> {
            Err(self.unsupported("update_shipping"))
        }

        async fn test_connection(&self) -> PlatformResult<bool> {
            Ok(true)
        }
    }

    /// Hands out scripted adapters; connections without one have
    /// incomplete credentials.
    #[derive(Default)]
    struct FakeFactory {
        adapters: HashMap<ConnectionId, Arc<FakeAdapter>>,
    }

    impl ClientFactory for FakeFactory {
        fn client_for(
            &self,
            connection: &PlatformConnection,
            _cancel: &CancellationToken,
        ) -> Result<Arc<dyn PlatformAdapter>, CredentialError> {
            self.adapters
                .get(&connection.id)
                .map(|adapter| Arc::clone(adapter) as Arc<dyn PlatformAdapter>)
                .ok_or(CredentialError::MissingFields {
                    platform: connection.platform,
                    fields: vec!["apiSecret"],
                })
        }
    }

    struct Harness {
        org: OrgId,
        store: Arc<MemoryStore>,
        factory: FakeFactory,
        options: SyncOptions,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                org: OrgId::generate(),
                store: Arc::new(MemoryStore::new()),
                factory: FakeFactory::default(),
                options: SyncOptions::default(),
            }
        }

        /// Add a connection served by `adapter`.
        fn connect(&mut self, adapter: FakeAdapter) -> (ConnectionId, Arc<FakeAdapter>) {
            let connection = fixtures::connection(self.org, adapter.platform());
            let id = connection.id;
            let adapter = Arc::new(adapter);
            self.store.add_connection(connection);
            self.factory.adapters.insert(id, Arc::clone(&adapter));
            (id, adapter)
        }

        /// Add a connection that is no longer authorized.
        fn disconnected(&self, platform: PlatformType) -> ConnectionId {
            let mut connection = fixtures::connection(self.org, platform);
            connection.is_connected = false;
            let id = connection.id;
            self.store.add_connection(connection);
            id
        }

        fn product(&self, sku: &str, stock: i64) -> CanonicalProduct {
            let product = fixtures::product(sku);
            self.store.add_product(self.org, product.clone());
            self.store
                .add_inventory(self.org, fixtures::inventory(&product, stock));
            product
        }

        fn list(&self, product: &CanonicalProduct, connection_id: ConnectionId, remote_id: &str) {
            let connection = self.store.connection(connection_id).unwrap();
            let listing = ProductListing::synced(
                product.id,
                &connection,
                &fixtures::remote(remote_id, 0),
                Utc::now(),
            );
            self.store.add_listing(self.org, listing);
        }

        fn service(self) -> (SyncService, Arc<MemoryStore>, OrgId) {
            let stores = SyncStores::from_backend(Arc::clone(&self.store));
            let service =
                SyncService::new(self.org, stores, Arc::new(self.factory), self.options);
            (service, self.store, self.org)
        }
    }

    #[tokio::test]
    async fn test_push_isolates_platform_failures() {
        let mut h = Harness::new();
        let product = h.product("TEA-001", 5);
        let (failing, failing_adapter) = h.connect(FakeAdapter {
            fail_writes: true,
            ..FakeAdapter::new(PlatformType::Shopee)
        });
        let disconnected = h.disconnected(PlatformType::Shopline);
        let (healthy, healthy_adapter) = h.connect(FakeAdapter::new(PlatformType::Momo));
        let (service, store, org) = h.service();

        let report = service
            .sync_product_to_platforms(product.id, &[failing, disconnected, healthy, healthy])
            .await
            .unwrap();

        assert_eq!(report.results.len(), 3);
        assert!(matches!(
            report.results.get(&failing),
            Some(Err(SyncError::Platform(_)))
        ));
        assert!(matches!(
            report.results.get(&disconnected),
            Some(Err(SyncError::NotConnected(_)))
        ));
        assert_eq!(report.results.get(&healthy).unwrap().as_ref().unwrap().id, "new-1");
        assert_eq!(report.succeeded().collect::<Vec<_>>(), vec![&healthy]);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(failing_adapter.calls(), vec!["create:TEA-001"]);
        assert_eq!(healthy_adapter.calls(), vec!["create:TEA-001"]);

        let listings = store.listings(org);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings.first().unwrap().platform, PlatformType::Momo);

        assert_eq!(report.progress.status, SyncJobStatus::Completed);
        assert_eq!(report.progress.total_items, 3);
        assert_eq!(report.progress.processed_items, 3);
        assert_eq!(report.progress.failed_items, 2);

        let logs = store.logs(org);
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|entry| entry.job_id == Some(report.progress.job_id)));
    }

    #[tokio::test]
    async fn test_repush_updates_existing_listing() {
        let mut h = Harness::new();
        let product = h.product("TEA-001", 5);
        let (conn, adapter) = h.connect(FakeAdapter::new(PlatformType::Shopee));
        h.list(&product, conn, "998");
        let (service, store, org) = h.service();

        for _ in 0..2 {
            let report = service
                .sync_product_to_platforms(product.id, &[conn])
                .await
                .unwrap();
            assert!(report.errors.is_empty());
        }

        assert_eq!(adapter.calls(), vec!["update:998", "update:998"]);
        let listings = store.listings(org);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings.first().unwrap().remote_id(), Some("998"));
        assert!(store.logs(org).iter().all(|e| e.action == SyncAction::UpdateProduct));
    }

    #[tokio::test]
    async fn test_failed_push_marks_existing_listing() {
        let mut h = Harness::new();
        let product = h.product("TEA-001", 5);
        let (conn, _) = h.connect(FakeAdapter {
            fail_writes: true,
            ..FakeAdapter::new(PlatformType::Shopee)
        });
        h.list(&product, conn, "998");
        let (service, store, org) = h.service();

        service
            .sync_product_to_platforms(product.id, &[conn])
            .await
            .unwrap();

        let listing = store.listings(org).pop().unwrap();
        assert_eq!(listing.sync_status, SyncStatus::Failed);
        assert_eq!(listing.last_sync_error.as_deref(), Some("HTTP 500: boom"));
        let log = store.logs(org).pop().unwrap();
        assert_eq!(log.status, SyncLogStatus::Error);
    }

    #[tokio::test]
    async fn test_push_of_unknown_product_fails_the_job() {
        let mut h = Harness::new();
        let (conn, adapter) = h.connect(FakeAdapter::new(PlatformType::Shopee));
        let (service, _, _) = h.service();

        let report = service
            .sync_product_to_platforms(ProductId::generate(), &[conn])
            .await
            .unwrap();

        assert_eq!(report.progress.status, SyncJobStatus::Failed);
        assert!(report.results.is_empty());
        assert!(report.errors.first().unwrap().contains("not found"));
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_accounting() {
        let mut h = Harness::new();
        let products: Vec<_> = ["TEA-001", "TEA-002", "TEA-003"]
            .into_iter()
            .map(|sku| h.product(sku, 7))
            .collect();
        let (shopee, shopee_adapter) = h.connect(FakeAdapter {
            failing_stock: vec!["s-TEA-002".to_string()],
            ..FakeAdapter::new(PlatformType::Shopee)
        });
        let (momo, momo_adapter) = h.connect(FakeAdapter::new(PlatformType::Momo));
        for product in &products {
            h.list(product, shopee, &format!("s-{}", product.sku));
            h.list(product, momo, &format!("m-{}", product.sku));
        }
        let (service, store, org) = h.service();

        let progress = service.sync_inventory(None).await.unwrap();

        assert_eq!(progress.status, SyncJobStatus::Completed);
        assert_eq!(progress.total_items, 6);
        assert_eq!(progress.processed_items, 6);
        assert_eq!(progress.failed_items, 1);
        assert_eq!(progress.errors, vec!["shopee/TEA-002: HTTP 500: boom".to_string()]);
        assert_eq!(shopee_adapter.calls().len(), 3);
        assert_eq!(momo_adapter.calls().len(), 3);

        let failed = store
            .listings(org)
            .into_iter()
            .find(|l| l.remote_id() == Some("s-TEA-002"))
            .unwrap();
        assert_eq!(failed.platform_stock, 0);
        let pushed = store
            .listings(org)
            .into_iter()
            .find(|l| l.remote_id() == Some("m-TEA-002"))
            .unwrap();
        assert_eq!(pushed.platform_stock, 7);
        assert_eq!(store.logs(org).len(), 6);

        let job = store.jobs(org).pop().unwrap();
        assert_eq!(job.progress(), progress);
    }

    #[tokio::test]
    async fn test_unlisted_items_are_skipped_not_failed() {
        let mut h = Harness::new();
        let product = h.product("TEA-001", 3);
        h.product("TEA-002", 4);
        let (conn, adapter) = h.connect(FakeAdapter::new(PlatformType::Momo));
        h.list(&product, conn, "m-1");
        let (service, _, _) = h.service();

        let progress = service.sync_inventory(None).await.unwrap();

        assert_eq!(progress.total_items, 2);
        assert_eq!(progress.processed_items, 2);
        assert_eq!(progress.failed_items, 0);
        assert_eq!(adapter.calls(), vec!["stock:m-1=3"]);
    }

    #[tokio::test]
    async fn test_credential_failure_fails_every_pair_of_that_connection() {
        let mut h = Harness::new();
        h.product("TEA-001", 3);
        h.product("TEA-002", 4);
        h.connect(FakeAdapter::new(PlatformType::Shopee));
        let orphan = fixtures::connection(h.org, PlatformType::Momo);
        h.store.add_connection(orphan);
        let (service, _, _) = h.service();

        let progress = service.sync_inventory(None).await.unwrap();

        assert_eq!(progress.total_items, 4);
        assert_eq!(progress.processed_items, 4);
        assert_eq!(progress.failed_items, 2);
        assert!(progress.errors.first().unwrap().contains("apiSecret"));
    }

    #[tokio::test]
    async fn test_unreadable_connections_fail_the_job() {
        let h = Harness::new();
        h.store.set_connections_unavailable(true);
        let (service, store, org) = h.service();

        let progress = service.sync_inventory(None).await.unwrap();

        assert_eq!(progress.status, SyncJobStatus::Failed);
        assert!(progress.errors.last().unwrap().contains("connection store unavailable"));
        assert_eq!(store.jobs(org).pop().unwrap().status, SyncJobStatus::Failed);
    }

    #[tokio::test]
    async fn test_orders_are_paged_and_imported() {
        let mut h = Harness::new();
        h.options.orders.page_size = 2;
        let orders = (1..=5)
            .map(|n| fixtures::platform_order(&format!("O-{n}")))
            .collect();
        let (_, adapter) = h.connect(FakeAdapter {
            orders,
            ..FakeAdapter::new(PlatformType::Shopline)
        });
        let (service, store, org) = h.service();

        let progress = service.sync_orders(None, None, None).await.unwrap();

        assert_eq!(progress.status, SyncJobStatus::Completed);
        assert_eq!(progress.total_items, 5);
        assert_eq!(progress.processed_items, 5);
        assert_eq!(adapter.calls(), vec!["orders:1", "orders:2", "orders:3"]);
        assert_eq!(store.orders(org).len(), 5);

        let logs = store.logs(org);
        assert_eq!(logs.len(), 5);
        assert!(logs.iter().any(|e| e.message.as_deref() == Some("Imported order O-3")));

        // A second pull updates the same rows.
        service.sync_orders(None, None, None).await.unwrap();
        assert_eq!(store.orders(org).len(), 5);
    }

    #[tokio::test]
    async fn test_unusable_lookback_fails_the_job_without_calls() {
        for lookback_days in [-3, 0, 1_000_000_000_000] {
            let mut h = Harness::new();
            h.options.orders.lookback_days = lookback_days;
            let (_, adapter) = h.connect(FakeAdapter::new(PlatformType::Momo));
            let (service, _, _) = h.service();

            let progress = service.sync_orders(None, None, None).await.unwrap();

            assert_eq!(progress.status, SyncJobStatus::Failed, "{lookback_days}");
            assert!(progress.errors.last().unwrap().starts_with("Invalid order window"));
            assert!(adapter.calls().is_empty());
        }
    }

    #[test]
    fn test_explicit_window_must_not_be_reversed() {
        let end = Utc::now();
        let start = end + Duration::hours(1);
        assert!(order_window(Some(start), Some(end), 7).is_err());

        let (from, to) = order_window(None, Some(end), 7).unwrap();
        assert_eq!(to - from, Duration::days(7));
    }

    #[tokio::test]
    async fn test_orders_filter_by_platform() {
        let mut h = Harness::new();
        let (_, shopee) = h.connect(FakeAdapter::new(PlatformType::Shopee));
        let (_, momo) = h.connect(FakeAdapter::new(PlatformType::Momo));
        let (service, _, _) = h.service();

        service
            .sync_orders(Some(PlatformType::Momo), None, None)
            .await
            .unwrap();

        assert!(shopee.calls().is_empty());
        assert_eq!(momo.calls(), vec!["orders:1"]);
    }

    #[tokio::test]
    async fn test_rejected_token_is_refreshed_once() {
        let mut h = Harness::new();
        let (conn, adapter) = h.connect(FakeAdapter {
            orders: vec![fixtures::platform_order("O-1")],
            reject_token_once: AtomicBool::new(true),
            ..FakeAdapter::new(PlatformType::Shopee)
        });
        let (service, store, org) = h.service();

        let progress = service.sync_orders(None, None, None).await.unwrap();

        assert_eq!(progress.processed_items, 1);
        assert!(progress.errors.is_empty());
        assert_eq!(adapter.calls(), vec!["orders:1", "refresh", "orders:1"]);

        let stored = store.connection(conn).unwrap();
        assert_eq!(stored.access_token.unwrap().expose_secret(), "fresh-token");
        assert!(
            store
                .logs(org)
                .iter()
                .any(|e| e.action == SyncAction::RefreshToken)
        );
    }

    #[tokio::test]
    async fn test_full_sync_sums_both_phases() {
        let mut h = Harness::new();
        let product = h.product("TEA-001", 2);
        let (conn, _) = h.connect(FakeAdapter {
            orders: vec![
                fixtures::platform_order("O-1"),
                fixtures::platform_order("O-2"),
            ],
            ..FakeAdapter::new(PlatformType::Momo)
        });
        h.list(&product, conn, "m-1");
        let (service, store, org) = h.service();

        let progress = service.full_sync().await.unwrap();

        assert_eq!(progress.status, SyncJobStatus::Completed);
        assert_eq!(progress.total_items, 3);
        assert_eq!(progress.processed_items, 3);
        let jobs = store.jobs(org);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.first().unwrap().job_type, SyncJobType::FullSync);
    }

    #[tokio::test]
    async fn test_cancelled_run_attempts_nothing() {
        let mut h = Harness::new();
        let product = h.product("TEA-001", 2);
        let (conn, adapter) = h.connect(FakeAdapter::new(PlatformType::Momo));
        h.list(&product, conn, "m-1");
        let (service, _, _) = h.service();
        let cancel = CancellationToken::new();
        let service = service.with_cancellation(cancel.clone());
        cancel.cancel();

        let progress = service.full_sync().await.unwrap();

        assert_eq!(progress.status, SyncJobStatus::Failed);
        assert_eq!(progress.processed_items, 0);
        assert_eq!(progress.errors, vec!["sync cancelled".to_string()]);
        assert!(adapter.calls().is_empty());
    }
}
