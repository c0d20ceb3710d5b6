//! Drives product-push and order-pull cycles for one integration at a time.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use common::{IntegrationId, ProductId};
use domain::catalog::{plan_product_sync, update_mirror};
use domain::repository::{IntegrationRepository, ListingRepository, ProductRepository};
use domain::{
    DomainError, IngestOutcome, IntegrationRegistry, ListingAction, Order, OrderService,
    OrderStatusUpdate, PlatformIntegration, ProductPlatform, ProductSyncItem, SyncStatus,
    UnitOfWork, finish,
};
use futures_util::StreamExt;
use futures_util::future::join_all;

use crate::adapter::{AdapterSet, Credentials, PlatformAdapter};
use crate::clock::{Clock, SystemClock};
use crate::config::{MirrorPolicy, SyncConfig};
use crate::credentials::CredentialStore;
use crate::error::{AdapterError, Result, SyncError};
use crate::result::{ItemError, ItemOutcome, SyncItem, SyncResult, SyncScope};

/// A local order status change and what happened when it was mirrored.
#[derive(Debug, Clone)]
pub struct OrderStatusChange {
    pub order: Order,
    /// Set when the platform refused the change under [`MirrorPolicy::Warn`].
    pub mirror_error: Option<String>,
}

/// Everything one run needs, resolved before the integration is claimed.
struct RunContext {
    integration: PlatformIntegration,
    adapter: Arc<dyn PlatformAdapter>,
    credentials: Credentials,
    /// Set once the integration is seen deactivated mid-run.
    cancelled: AtomicBool,
}

/// Orchestrates sync runs.
///
/// A run claims its integration by committing `InProgress` in a short
/// transaction, pushes products with bounded concurrency, pulls orders one
/// transaction per order, then commits the terminal status. A second trigger
/// for a claimed integration fails with [`SyncError::AlreadySyncing`].
pub struct SyncOrchestrator<U, C>
where
    U: UnitOfWork + Clone,
    C: CredentialStore,
{
    uow: U,
    registry: IntegrationRegistry<U>,
    orders: OrderService<U>,
    adapters: AdapterSet,
    credentials: C,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
}

impl<U, C> SyncOrchestrator<U, C>
where
    U: UnitOfWork + Clone,
    C: CredentialStore,
{
    pub fn new(uow: U, adapters: AdapterSet, credentials: C, config: SyncConfig) -> Self {
        Self {
            registry: IntegrationRegistry::new(uow.clone()),
            orders: OrderService::new(uow.clone()),
            uow,
            adapters,
            credentials,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the system clock, for tests and replays.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Pushes every product of the integration's store that needs it.
    pub async fn sync_products(&self, integration_id: IntegrationId) -> Result<SyncResult> {
        self.run(integration_id, SyncScope::Products, None).await
    }

    /// Pulls orders modified since the integration's order cursor.
    pub async fn sync_orders(&self, integration_id: IntegrationId) -> Result<SyncResult> {
        self.run(integration_id, SyncScope::Orders, None).await
    }

    /// Products then orders, under one claim, aggregated into one result.
    pub async fn full_sync(&self, integration_id: IntegrationId) -> Result<SyncResult> {
        self.run(integration_id, SyncScope::Full, None).await
    }

    /// Pushes a single product, under the same one-run-per-integration rule.
    pub async fn sync_product(
        &self,
        product_id: ProductId,
        integration_id: IntegrationId,
    ) -> Result<SyncResult> {
        self.run(integration_id, SyncScope::Products, Some(product_id))
            .await
    }

    /// Dispatches on `scope`; used by manual triggers.
    pub async fn sync(&self, integration_id: IntegrationId, scope: SyncScope) -> Result<SyncResult> {
        self.run(integration_id, scope, None).await
    }

    /// Full sync of every integration due at `now`, concurrently.
    ///
    /// Per-integration failures, including `AlreadySyncing`, are returned
    /// alongside the successes.
    #[tracing::instrument(skip(self))]
    pub async fn run_due(
        &self,
        now: DateTime<Utc>,
        default_interval: chrono::Duration,
    ) -> Result<Vec<(IntegrationId, Result<SyncResult>)>> {
        let due = self.registry.get_due_for_sync(now, default_interval).await?;
        tracing::debug!(count = due.len(), "integrations due for sync");

        let runs = due.into_iter().map(|integration| async move {
            let outcome = self.full_sync(integration.id).await;
            (integration.id, outcome)
        });
        Ok(join_all(runs).await)
    }

    /// Checks the stored credentials once. Never retries or changes state.
    #[tracing::instrument(skip(self))]
    pub async fn test_connection(&self, integration_id: IntegrationId) -> Result<bool> {
        let integration = self.registry.get(integration_id).await?;
        let (adapter, credentials) = self.resolve(&integration).await?;

        let connected =
            match tokio::time::timeout(self.config.call_timeout, adapter.test_connection(&credentials))
                .await
            {
                Ok(Ok(connected)) => connected,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "connection test failed");
                    false
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.config.call_timeout.as_millis() as u64,
                        "connection test timed out"
                    );
                    false
                }
            };
        Ok(connected)
    }

    /// Changes an order's status locally, then mirrors it to the platform.
    ///
    /// The local change is committed before the platform is called and is
    /// never rolled back. A mirror failure is handled per
    /// [`SyncConfig::order_status_mirror`].
    #[tracing::instrument(skip(self), fields(order_id = %update.order_id, status = %update.status))]
    pub async fn update_order_status(&self, update: OrderStatusUpdate) -> Result<OrderStatusChange> {
        let order = self.orders.update_status(update).await?;

        let mirrored = self.mirror_status(&order).await;
        match (mirrored, self.config.order_status_mirror) {
            (Ok(()), _) | (Err(_), MirrorPolicy::Ignore) => Ok(OrderStatusChange {
                order,
                mirror_error: None,
            }),
            (Err(err), MirrorPolicy::Warn) => {
                tracing::warn!(error = %err, "order status not mirrored to platform");
                Ok(OrderStatusChange {
                    order,
                    mirror_error: Some(err.to_string()),
                })
            }
            (Err(err), MirrorPolicy::Fail) => {
                tracing::warn!(error = %err, "order status not mirrored to platform");
                Err(err)
            }
        }
    }

    async fn mirror_status(&self, order: &Order) -> Result<()> {
        let integration = self.registry.get(order.integration_id).await?;
        let (adapter, credentials) = self.resolve(&integration).await?;
        let mut attempts = 0;
        self.call("update_order_status", &mut attempts, || {
            adapter.update_order_status(&order.platform_order_id, order.status, &credentials)
        })
        .await
        .map_err(SyncError::StatusMirror)
    }

    #[tracing::instrument(skip(self, only), fields(platform = tracing::field::Empty))]
    async fn run(
        &self,
        integration_id: IntegrationId,
        scope: SyncScope,
        only: Option<ProductId>,
    ) -> Result<SyncResult> {
        let integration = self.registry.get(integration_id).await?;
        if !integration.is_active {
            metrics::counter!("sync_rejected_total", "reason" => "inactive").increment(1);
            return Err(SyncError::IntegrationInactive(integration_id));
        }
        let (adapter, credentials) = self.resolve(&integration).await?;
        tracing::Span::current().record("platform", integration.platform_type.as_str());

        let integration = self.begin_run(integration_id).await?;
        let ctx = RunContext {
            integration,
            adapter,
            credentials,
            cancelled: AtomicBool::new(false),
        };

        let started = std::time::Instant::now();
        let mut result = SyncResult::new(integration_id, scope, self.clock.now());
        tracing::info!(%integration_id, "sync started");

        let phases: Result<Option<DateTime<Utc>>> = async {
            if scope != SyncScope::Orders {
                self.push_products(&ctx, only, &mut result).await?;
            }
            if scope != SyncScope::Products {
                return Ok(self.pull_orders(&ctx, &mut result).await);
            }
            Ok(None)
        }
        .await;

        let cursor = match phases {
            Ok(cursor) => cursor,
            Err(err) => {
                tracing::error!(%integration_id, error = %err, "sync aborted");
                if let Err(finish_err) = self
                    .finish_run(integration_id, SyncStatus::Failed, None)
                    .await
                {
                    tracing::warn!(error = %finish_err, "could not record aborted sync");
                }
                metrics::counter!("sync_runs_total", "scope" => scope.as_str(), "status" => SyncStatus::Failed.as_str())
                    .increment(1);
                return Err(err);
            }
        };

        result.complete(self.clock.now());
        if let Err(err) = self.finish_run(integration_id, result.status, cursor).await {
            tracing::error!(
                %integration_id,
                error = %err,
                "sync finished but its status was not recorded"
            );
        }

        metrics::counter!("sync_runs_total", "scope" => scope.as_str(), "status" => result.status.as_str())
            .increment(1);
        metrics::histogram!("sync_duration_seconds", "scope" => scope.as_str())
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            %integration_id,
            status = %result.status,
            succeeded = result.items_succeeded,
            failed = result.items_failed,
            not_attempted = result.items_not_attempted,
            "sync finished"
        );
        Ok(result)
    }

    async fn resolve(
        &self,
        integration: &PlatformIntegration,
    ) -> Result<(Arc<dyn PlatformAdapter>, Credentials)> {
        let adapter = self
            .adapters
            .get(&integration.platform_type)
            .ok_or_else(|| SyncError::UnsupportedPlatform(integration.platform_type.clone()))?;
        let credentials = self
            .credentials
            .get_credentials(integration)
            .await
            .map_err(|reason| SyncError::Credentials {
                integration_id: integration.id,
                reason,
            })?;
        Ok((adapter, credentials))
    }

    /// Claims the integration for a run in its own short transaction.
    async fn begin_run(&self, integration_id: IntegrationId) -> Result<PlatformIntegration> {
        let now = self.clock.now();
        let stale_after = self.config.stale_after();
        let mut tx = self.uow.begin().await?;
        let result: Result<PlatformIntegration> = async {
            let mut integration = tx
                .lock_integration(integration_id)
                .await?
                .ok_or(SyncError::IntegrationNotFound(integration_id))?;
            if !integration.is_active {
                return Err(SyncError::IntegrationInactive(integration_id));
            }
            if integration.is_sync_in_flight(now, stale_after) {
                return Err(SyncError::AlreadySyncing(integration_id));
            }
            if integration.last_sync_status == SyncStatus::InProgress {
                tracing::warn!(
                    %integration_id,
                    started_at = ?integration.sync_started_at,
                    "reclaiming abandoned sync run"
                );
            }
            integration.begin_sync(now);
            tx.update_integration(&integration).await?;
            Ok(integration)
        }
        .await;

        let result = finish(tx, result).await;
        match &result {
            Err(SyncError::AlreadySyncing(_)) => {
                metrics::counter!("sync_rejected_total", "reason" => "already_syncing").increment(1);
            }
            Err(SyncError::IntegrationInactive(_)) => {
                metrics::counter!("sync_rejected_total", "reason" => "inactive").increment(1);
            }
            _ => {}
        }
        result
    }

    /// Records the terminal status, and the order cursor when the order
    /// phase ran.
    async fn finish_run(
        &self,
        integration_id: IntegrationId,
        status: SyncStatus,
        orders_synced_through: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut tx = self.uow.begin().await?;
        let result: Result<()> = async {
            let mut integration = tx
                .lock_integration(integration_id)
                .await?
                .ok_or(SyncError::IntegrationNotFound(integration_id))?;
            integration.finish_sync(status, now);
            if orders_synced_through.is_some() {
                integration.orders_synced_through = orders_synced_through;
            }
            tx.update_integration(&integration).await?;
            Ok(())
        }
        .await;
        finish(tx, result).await
    }

    async fn plan(
        &self,
        integration: &PlatformIntegration,
        only: Option<ProductId>,
    ) -> Result<Vec<ProductSyncItem>> {
        let mut tx = self.uow.begin().await?;
        let result: Result<Vec<ProductSyncItem>> = async {
            let products = match only {
                Some(product_id) => {
                    let product = tx
                        .get_product(product_id)
                        .await?
                        .ok_or(DomainError::ProductNotFound(product_id))?;
                    if product.store_id != integration.store_id {
                        return Err(DomainError::StoreMismatch {
                            entity: "product",
                            expected: integration.store_id,
                            actual: product.store_id,
                        }
                        .into());
                    }
                    vec![product]
                }
                None => tx.products_by_store(integration.store_id).await?,
            };
            let listings = tx.listings_by_integration(integration.id).await?;
            Ok(plan_product_sync(products, &listings))
        }
        .await;
        finish(tx, result).await
    }

    async fn push_products(
        &self,
        ctx: &RunContext,
        only: Option<ProductId>,
        result: &mut SyncResult,
    ) -> Result<()> {
        let plan = self.plan(&ctx.integration, only).await?;
        tracing::debug!(items = plan.len(), "product push planned");

        let outcomes: Vec<ItemOutcome> = futures_util::stream::iter(plan)
            .map(|item| self.push_item(ctx, item))
            .buffer_unordered(self.config.concurrency())
            .collect()
            .await;

        for outcome in outcomes {
            result.record_product(outcome);
        }
        Ok(())
    }

    async fn push_item(&self, ctx: &RunContext, item: ProductSyncItem) -> ItemOutcome {
        let product_id = item.product.id;
        if !self.still_running(ctx).await {
            return counted(ItemOutcome::NotAttempted);
        }

        let mut attempts = 0;
        let pushed = self.push_to_platform(ctx, &item, &mut attempts).await;
        let outcome = match pushed {
            Ok(updated) => match self.record_mirror(&updated).await {
                Ok(()) => {
                    tracing::debug!(%product_id, attempts, "product synced");
                    ItemOutcome::Succeeded
                }
                Err(err) => {
                    tracing::warn!(%product_id, error = %err, "product pushed but mirror not saved");
                    ItemOutcome::Failed(ItemError {
                        item: SyncItem::Product(product_id),
                        message: format!("pushed but not recorded: {err}"),
                        attempts,
                    })
                }
            },
            Err(err) => {
                tracing::warn!(%product_id, attempts, error = %err, "product sync failed");
                ItemOutcome::Failed(ItemError {
                    item: SyncItem::Product(product_id),
                    message: err.to_string(),
                    attempts,
                })
            }
        };
        counted(outcome)
    }

    /// Makes the platform calls for one item and returns the mirror row that
    /// reflects them.
    async fn push_to_platform(
        &self,
        ctx: &RunContext,
        item: &ProductSyncItem,
        attempts: &mut u32,
    ) -> std::result::Result<ProductPlatform, AdapterError> {
        let product = &item.product;
        let credentials = &ctx.credentials;
        let mut listing = item
            .listing
            .clone()
            .unwrap_or_else(|| ProductPlatform::unlisted(product.id, ctx.integration.id, true));

        match item.action {
            ListingAction::Publish => {
                let platform_product_id = self
                    .call("publish_product", attempts, || {
                        ctx.adapter.publish_product(product, credentials)
                    })
                    .await?;
                listing.platform_product_id = Some(platform_product_id);
                listing.platform_price = product.base_price;
                listing.platform_stock_quantity = product.stock_quantity();
                listing.is_listed = true;
            }
            ListingAction::Update { price, stock } => {
                let platform_product_id = listing
                    .platform_product_id
                    .clone()
                    .ok_or_else(|| AdapterError::permanent("listing has no platform product id"))?;
                if price {
                    self.call("update_price", attempts, || {
                        ctx.adapter
                            .update_price(&platform_product_id, product.base_price, credentials)
                    })
                    .await?;
                    listing.platform_price = product.base_price;
                }
                if stock {
                    self.call("update_stock", attempts, || {
                        ctx.adapter.update_stock(
                            &platform_product_id,
                            product.stock_quantity(),
                            credentials,
                        )
                    })
                    .await?;
                    listing.platform_stock_quantity = product.stock_quantity();
                }
            }
        }
        listing.last_sync_date = Some(self.clock.now());
        Ok(listing)
    }

    /// Saves the mirror with its ledger rows in one transaction.
    async fn record_mirror(&self, updated: &ProductPlatform) -> domain::Result<()> {
        let mut tx = self.uow.begin().await?;
        let result: domain::Result<()> = async {
            let current = tx
                .get_listing(updated.product_id, updated.integration_id)
                .await?;
            let mut updated = updated.clone();
            if let Some(current) = &current {
                updated.id = current.id;
                updated.auto_sync = current.auto_sync;
            }
            update_mirror(&mut tx, current.as_ref(), &updated).await
        }
        .await;
        finish(tx, result).await
    }

    /// Pulls and ingests orders; returns the order cursor to store, if any.
    ///
    /// A clean pull moves the cursor to the pull start. Orders that failed or
    /// were not attempted pin it at the earliest of their modification times,
    /// so the next pull fetches them again, but never further back than the
    /// retry window: older failures are given up on.
    async fn pull_orders(
        &self,
        ctx: &RunContext,
        result: &mut SyncResult,
    ) -> Option<DateTime<Utc>> {
        let pull_started = self.clock.now();
        let since = ctx.integration.order_cursor();

        if !self.still_running(ctx).await {
            result.record(counted(ItemOutcome::NotAttempted));
            return since;
        }

        let mut attempts = 0;
        let fetched = self
            .call("fetch_orders", &mut attempts, || {
                ctx.adapter.fetch_orders(&ctx.credentials, since)
            })
            .await;
        let raw_orders = match fetched {
            Ok(raw_orders) => raw_orders,
            Err(err) => {
                tracing::warn!(attempts, error = %err, "order fetch failed");
                result.record(counted(ItemOutcome::Failed(ItemError {
                    item: SyncItem::OrderFetch,
                    message: err.to_string(),
                    attempts,
                })));
                return since;
            }
        };
        tracing::debug!(count = raw_orders.len(), since = ?since, "orders fetched");

        let retry_floor = pull_started - self.config.retry_window();
        let mut unsettled: Option<DateTime<Utc>> = None;
        let mut settle_later = |modified_at: DateTime<Utc>| {
            unsettled = Some(unsettled.map_or(modified_at, |t| t.min(modified_at)));
        };

        for raw in &raw_orders {
            if !self.still_running(ctx).await {
                settle_later(raw.modified_at);
                result.record(counted(ItemOutcome::NotAttempted));
                continue;
            }
            match self.orders.ingest(&ctx.integration, raw).await {
                Ok(outcome) => {
                    tracing::debug!(
                        platform_order_id = %raw.platform_order_id,
                        outcome = outcome.as_str(),
                        "order ingested"
                    );
                    result.record_order(
                        counted(ItemOutcome::Succeeded),
                        outcome != IngestOutcome::Unchanged,
                    );
                }
                Err(err) => {
                    if raw.modified_at < retry_floor {
                        metrics::counter!("sync_orders_abandoned_total").increment(1);
                        tracing::error!(
                            platform_order_id = %raw.platform_order_id,
                            modified_at = %raw.modified_at,
                            error = %err,
                            "order still failing after the retry window, giving up"
                        );
                    } else {
                        settle_later(raw.modified_at);
                        tracing::warn!(
                            platform_order_id = %raw.platform_order_id,
                            error = %err,
                            "order ingest failed"
                        );
                    }
                    let failed = ItemOutcome::Failed(ItemError {
                        item: SyncItem::Order(raw.platform_order_id.clone()),
                        message: err.to_string(),
                        attempts: 1,
                    });
                    result.record_order(counted(failed), false);
                }
            }
        }

        Some(next_order_cursor(since, pull_started, unsettled, retry_floor))
    }

    /// Returns false once the integration has been deactivated mid-run.
    async fn still_running(&self, ctx: &RunContext) -> bool {
        if ctx.cancelled.load(Ordering::Acquire) {
            return false;
        }
        match self.is_active(ctx.integration.id).await {
            Ok(true) => true,
            Ok(false) => {
                if !ctx.cancelled.swap(true, Ordering::AcqRel) {
                    tracing::info!(
                        integration_id = %ctx.integration.id,
                        "integration deactivated, cancelling remaining items"
                    );
                }
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not re-check integration, continuing");
                true
            }
        }
    }

    async fn is_active(&self, integration_id: IntegrationId) -> Result<bool> {
        let mut tx = self.uow.begin().await?;
        let result: Result<bool> = tx
            .get_integration(integration_id)
            .await
            .map(|found| found.is_some_and(|i| i.is_active))
            .map_err(SyncError::from);
        finish(tx, result).await
    }

    /// One outbound call with timeout and bounded retry of transient errors.
    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        attempts: &mut u32,
        mut f: F,
    ) -> std::result::Result<T, AdapterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, AdapterError>>,
    {
        let mut retries = 0;
        loop {
            *attempts += 1;
            let outcome = match tokio::time::timeout(self.config.call_timeout, f()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AdapterError::timeout(self.config.call_timeout)),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && self.config.retry.should_retry(retries) => {
                    retries += 1;
                    let delay = self.config.retry.delay_for_retry(retries);
                    metrics::counter!("sync_adapter_retries_total", "operation" => operation)
                        .increment(1);
                    tracing::debug!(
                        operation,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying platform call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Cursor after a pull: the pull start when everything settled, otherwise
/// the earliest unsettled order, clamped to `[retry_floor, pull_started]` and
/// never behind the previous cursor.
fn next_order_cursor(
    since: Option<DateTime<Utc>>,
    pull_started: DateTime<Utc>,
    unsettled: Option<DateTime<Utc>>,
    retry_floor: DateTime<Utc>,
) -> DateTime<Utc> {
    let Some(earliest) = unsettled else {
        return pull_started;
    };
    let pinned = earliest.min(pull_started).max(retry_floor);
    since.map_or(pinned, |previous| pinned.max(previous))
}

fn counted(outcome: ItemOutcome) -> ItemOutcome {
    let label = match &outcome {
        ItemOutcome::Succeeded => "succeeded",
        ItemOutcome::Failed(_) => "failed",
        ItemOutcome::NotAttempted => "not_attempted",
    };
    metrics::counter!("sync_items_total", "outcome" => label).increment(1);
    outcome
}
