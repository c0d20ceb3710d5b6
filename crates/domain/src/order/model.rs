//! Orders, their line items, and the raw form platforms report them in.

use chrono::{DateTime, Utc};
use common::{IntegrationId, Money, OrderId, OrderItemId, ProductId, StoreId};
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// An order pulled from a platform.
///
/// The external identity is `(integration_id, platform_order_id)`; pulling the
/// same platform order again updates this row instead of adding one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub store_id: StoreId,
    pub integration_id: IntegrationId,
    pub platform_order_id: String,
    /// `{PLATFORM}-{platform_order_id}`.
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub shipping_amount: Option<Money>,
    pub discount_amount: Option<Money>,
    pub tax_amount: Option<Money>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub cargo_company: Option<String>,
    pub tracking_number: Option<String>,
    pub order_date: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Moves the order to `next` and stamps the shipping dates it implies.
    /// The caller checks the transition first.
    pub(crate) fn set_status(&mut self, next: OrderStatus, now: DateTime<Utc>) {
        match next {
            OrderStatus::Shipped => {
                self.shipped_at.get_or_insert(now);
            }
            OrderStatus::Delivered => {
                self.shipped_at.get_or_insert(now);
                self.delivered_at = Some(now);
            }
            _ => {}
        }
        self.status = next;
        self.updated_at = now;
    }
}

/// One order line. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` when the line could not be matched to a catalog product.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub sku: Option<String>,
    pub platform_product_id: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub discount_amount: Option<Money>,
    pub total_price: Money,
}

/// An order as reported by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrder {
    pub platform_order_id: String,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    /// Last modification on the platform; incremental pulls filter on it.
    pub modified_at: DateTime<Utc>,
    pub total_amount: Money,
    pub shipping_amount: Option<Money>,
    pub discount_amount: Option<Money>,
    pub tax_amount: Option<Money>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub billing_address: Option<String>,
    pub cargo_company: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<RawOrderItem>,
}

impl RawOrder {
    /// Creates a raw order with no lines; the total follows added lines.
    pub fn new(platform_order_id: impl Into<String>, status: OrderStatus) -> Self {
        let now = Utc::now();
        Self {
            platform_order_id: platform_order_id.into(),
            status,
            order_date: now,
            modified_at: now,
            total_amount: Money::zero(),
            shipping_amount: None,
            discount_amount: None,
            tax_amount: None,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            shipping_address: None,
            billing_address: None,
            cargo_company: None,
            tracking_number: None,
            notes: None,
            items: Vec::new(),
        }
    }

    /// Adds a line; an overflowing line saturates the total.
    pub fn with_item(mut self, item: RawOrderItem) -> Self {
        let line = item.total_price().unwrap_or(Money::from_cents(i64::MAX));
        self.total_amount = self.total_amount.saturating_add(line);
        self.items.push(item);
        self
    }
}

/// An order line as reported by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrderItem {
    pub platform_product_id: Option<String>,
    pub sku: Option<String>,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub discount_amount: Option<Money>,
}

impl RawOrderItem {
    pub fn new(product_name: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            platform_product_id: None,
            sku: None,
            product_name: product_name.into(),
            quantity,
            unit_price,
            discount_amount: None,
        }
    }

    /// Links the line to a listing; takes precedence over the SKU.
    pub fn with_platform_product_id(mut self, id: impl Into<String>) -> Self {
        self.platform_product_id = Some(id.into());
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Line total after the line discount; `None` if it does not fit.
    pub fn total_price(&self) -> Option<Money> {
        let gross = self.unit_price.checked_mul(self.quantity)?;
        match self.discount_amount {
            Some(discount) => gross.checked_sub(discount),
            None => Some(gross),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_order_total_follows_lines() {
        let mut discounted = RawOrderItem::new("Mug", 2, Money::from_cents(500));
        discounted.discount_amount = Some(Money::from_cents(100));
        let raw = RawOrder::new("TY-1", OrderStatus::Pending)
            .with_item(RawOrderItem::new("Cup", 3, Money::from_cents(250)))
            .with_item(discounted);

        assert_eq!(raw.total_amount, Money::from_cents(750 + 900));
    }

    #[test]
    fn overflowing_line_has_no_total() {
        let line = RawOrderItem::new("Crate", 3, Money::from_cents(i64::MAX / 2));
        assert_eq!(line.total_price(), None);

        let raw = RawOrder::new("TY-2", OrderStatus::Pending).with_item(line);
        assert_eq!(raw.total_amount, Money::from_cents(i64::MAX));
    }
}
