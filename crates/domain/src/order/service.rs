//! Order service: status changes and idempotent ingest of platform orders.

use chrono::Utc;
use common::{IntegrationId, OrderId, OrderItemId, ProductId};

use super::{Order, OrderItem, OrderStatus, RawOrder, RawOrderItem};
use crate::catalog::{StockChange, apply_stock_change};
use crate::error::{DomainError, Result};
use crate::integration::PlatformIntegration;
use crate::repository::{
    ListingRepository, OrderRepository, ProductRepository, Transaction, UnitOfWork, finish,
};

/// Result of upserting one platform order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First time this platform order was seen.
    Inserted,
    /// A known order whose status or header fields changed.
    Updated,
    /// A known order with nothing new.
    Unchanged,
}

impl IngestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestOutcome::Inserted => "inserted",
            IngestOutcome::Updated => "updated",
            IngestOutcome::Unchanged => "unchanged",
        }
    }
}

/// A local status change requested by an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusUpdate {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub cargo_company: Option<String>,
    pub notes: Option<String>,
}

impl OrderStatusUpdate {
    pub fn new(order_id: OrderId, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            tracking_number: None,
            cargo_company: None,
            notes: None,
        }
    }

    pub fn with_tracking(
        mut self,
        cargo_company: impl Into<String>,
        tracking_number: impl Into<String>,
    ) -> Self {
        self.cargo_company = Some(cargo_company.into());
        self.tracking_number = Some(tracking_number.into());
        self
    }
}

/// Moves `order` to `next` inside `tx`, giving linked stock back when the
/// new status releases it. The order row itself is not written.
async fn transition<T: Transaction>(tx: &mut T, order: &mut Order, next: OrderStatus) -> Result<()> {
    if !order.status.can_transition_to(next) {
        return Err(DomainError::InvalidStatusTransition {
            from: order.status,
            to: next,
        });
    }
    if next.releases_stock() {
        for item in tx.order_items(order.id).await? {
            if let Some(product_id) = item.product_id {
                apply_stock_change(tx, &StockChange::order_return(product_id, item.quantity, order.id))
                    .await?;
            }
        }
    }
    order.set_status(next, Utc::now());
    Ok(())
}

async fn resolve_product<T: Transaction>(
    tx: &mut T,
    integration: &PlatformIntegration,
    item: &RawOrderItem,
) -> Result<Option<ProductId>> {
    if let Some(platform_product_id) = &item.platform_product_id {
        if let Some(listing) = tx
            .find_listing_by_platform_product(integration.id, platform_product_id)
            .await?
        {
            return Ok(Some(listing.product_id));
        }
    }
    if let Some(sku) = &item.sku {
        if let Some(product) = tx.find_product_by_sku(integration.store_id, sku).await? {
            return Ok(Some(product.id));
        }
    }
    Ok(None)
}

fn replace_if_new(field: &mut Option<String>, incoming: &Option<String>) -> bool {
    match incoming {
        Some(value) if field.as_ref() != Some(value) => {
            *field = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// Inserts or updates one platform order inside `tx`.
///
/// A new order is inserted with its items, and the stock of every linked item
/// is decremented with a `Sale` row, unless the order already arrives
/// cancelled or returned. A known order gets forward status moves and header
/// changes; its items are never touched. Remote moves the local status
/// machine does not allow are ignored.
pub async fn upsert_platform_order<T: Transaction>(
    tx: &mut T,
    integration: &PlatformIntegration,
    raw: &RawOrder,
) -> Result<IngestOutcome> {
    let existing = tx
        .find_order_by_platform_id(integration.id, &raw.platform_order_id)
        .await?;

    let Some(mut order) = existing else {
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            store_id: integration.store_id,
            integration_id: integration.id,
            platform_order_id: raw.platform_order_id.clone(),
            order_number: format!("{}-{}", integration.platform_type, raw.platform_order_id),
            status: raw.status,
            total_amount: raw.total_amount,
            shipping_amount: raw.shipping_amount,
            discount_amount: raw.discount_amount,
            tax_amount: raw.tax_amount,
            customer_name: raw.customer_name.clone(),
            customer_email: raw.customer_email.clone(),
            customer_phone: raw.customer_phone.clone(),
            shipping_address: raw.shipping_address.clone(),
            billing_address: raw.billing_address.clone(),
            cargo_company: raw.cargo_company.clone(),
            tracking_number: raw.tracking_number.clone(),
            order_date: raw.order_date,
            shipped_at: matches!(raw.status, OrderStatus::Shipped | OrderStatus::Delivered)
                .then_some(raw.modified_at),
            delivered_at: (raw.status == OrderStatus::Delivered).then_some(raw.modified_at),
            notes: raw.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        let mut items = Vec::with_capacity(raw.items.len());
        for line in &raw.items {
            items.push(OrderItem {
                id: OrderItemId::new(),
                order_id: order.id,
                product_id: resolve_product(tx, integration, line).await?,
                product_name: line.product_name.clone(),
                sku: line.sku.clone(),
                platform_product_id: line.platform_product_id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount_amount: line.discount_amount,
                total_price: line.total_price().ok_or_else(|| {
                    DomainError::InvalidAmount(format!(
                        "line {} of order {}: {} x {} overflows",
                        line.product_name, raw.platform_order_id, line.quantity, line.unit_price
                    ))
                })?,
            });
        }

        tx.insert_order(&order, &items).await?;
        if !order.status.releases_stock() {
            for item in &items {
                if let Some(product_id) = item.product_id {
                    apply_stock_change(tx, &StockChange::sale(product_id, item.quantity, order.id))
                        .await?;
                }
            }
        }
        let unmatched = items.iter().filter(|i| i.product_id.is_none()).count();
        if unmatched > 0 {
            tracing::warn!(
                order_number = %order.order_number,
                unmatched,
                "order lines without a catalog product"
            );
        }
        return Ok(IngestOutcome::Inserted);
    };

    let mut changed = false;
    if raw.status != order.status {
        if order.status.can_transition_to(raw.status) {
            transition(tx, &mut order, raw.status).await?;
            changed = true;
        } else {
            tracing::warn!(
                order_number = %order.order_number,
                local = %order.status,
                remote = %raw.status,
                "ignoring remote status change"
            );
        }
    }
    changed |= replace_if_new(&mut order.tracking_number, &raw.tracking_number);
    changed |= replace_if_new(&mut order.cargo_company, &raw.cargo_company);
    changed |= replace_if_new(&mut order.customer_name, &raw.customer_name);
    changed |= replace_if_new(&mut order.customer_email, &raw.customer_email);
    changed |= replace_if_new(&mut order.customer_phone, &raw.customer_phone);
    changed |= replace_if_new(&mut order.shipping_address, &raw.shipping_address);
    changed |= replace_if_new(&mut order.notes, &raw.notes);

    if !changed {
        return Ok(IngestOutcome::Unchanged);
    }
    order.updated_at = Utc::now();
    tx.update_order(&order).await?;
    Ok(IngestOutcome::Updated)
}

/// Service for querying orders and changing their status.
pub struct OrderService<U: UnitOfWork> {
    uow: U,
}

impl<U: UnitOfWork> OrderService<U> {
    /// Creates a new order service over the given unit of work.
    pub fn new(uow: U) -> Self {
        Self { uow }
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        let mut tx = self.uow.begin().await?;
        let result = match tx.get_order(id).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(DomainError::OrderNotFound(id)),
            Err(err) => Err(err.into()),
        };
        finish(tx, result).await
    }

    pub async fn order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let mut tx = self.uow.begin().await?;
        let result = tx.order_items(order_id).await.map_err(DomainError::from);
        finish(tx, result).await
    }

    pub async fn orders_by_integration(&self, integration_id: IntegrationId) -> Result<Vec<Order>> {
        let mut tx = self.uow.begin().await?;
        let result = tx
            .orders_by_integration(integration_id)
            .await
            .map_err(DomainError::from);
        finish(tx, result).await
    }

    pub async fn orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let mut tx = self.uow.begin().await?;
        let result = tx.orders_by_status(status).await.map_err(DomainError::from);
        finish(tx, result).await
    }

    /// Changes an order's status locally.
    ///
    /// Moving to `Cancelled` or `Returned` restocks every linked line in the
    /// same transaction.
    #[tracing::instrument(skip(self), fields(order_id = %update.order_id, status = %update.status))]
    pub async fn update_status(&self, update: OrderStatusUpdate) -> Result<Order> {
        let mut tx = self.uow.begin().await?;
        let result: Result<Order> = async {
            let mut order = tx
                .get_order(update.order_id)
                .await?
                .ok_or(DomainError::OrderNotFound(update.order_id))?;
            transition(&mut tx, &mut order, update.status).await?;
            replace_if_new(&mut order.tracking_number, &update.tracking_number);
            replace_if_new(&mut order.cargo_company, &update.cargo_company);
            replace_if_new(&mut order.notes, &update.notes);
            tx.update_order(&order).await?;
            Ok(order)
        }
        .await;
        finish(tx, result).await
    }

    /// Upserts one platform order in its own transaction.
    #[tracing::instrument(
        skip(self, integration, raw),
        fields(integration_id = %integration.id, platform_order_id = %raw.platform_order_id)
    )]
    pub async fn ingest(
        &self,
        integration: &PlatformIntegration,
        raw: &RawOrder,
    ) -> Result<IngestOutcome> {
        let mut tx = self.uow.begin().await?;
        let result = upsert_platform_order(&mut tx, integration, raw).await;
        let outcome = finish(tx, result).await?;
        metrics::counter!("orders_ingested_total", "outcome" => outcome.as_str()).increment(1);
        Ok(outcome)
    }
}
