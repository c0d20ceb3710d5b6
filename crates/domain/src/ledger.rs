//! Append-only stock and price audit ledger.
//!
//! Rows are only ever appended, never updated or deleted. Every mutation of a
//! product's stock or price (and of a listing's mirrored stock or price)
//! writes exactly one row in the same transaction as the mutation itself.

use chrono::{DateTime, Utc};
use common::{HistoryId, IntegrationId, Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// Why a stock quantity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockChangeType {
    Sale,
    Restock,
    Adjustment,
    Return,
    /// A listing's mirrored quantity was pushed to the platform.
    Sync,
}

impl StockChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockChangeType::Sale => "Sale",
            StockChangeType::Restock => "Restock",
            StockChangeType::Adjustment => "Adjustment",
            StockChangeType::Return => "Return",
            StockChangeType::Sync => "Sync",
        }
    }
}

impl std::fmt::Display for StockChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StockChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Sale" => Ok(StockChangeType::Sale),
            "Restock" => Ok(StockChangeType::Restock),
            "Adjustment" => Ok(StockChangeType::Adjustment),
            "Return" => Ok(StockChangeType::Return),
            "Sync" => Ok(StockChangeType::Sync),
            other => Err(format!("unknown stock change type: {other}")),
        }
    }
}

/// Why a price changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceChangeType {
    Manual,
    Automatic,
    Campaign,
    Competitive,
}

impl PriceChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceChangeType::Manual => "Manual",
            PriceChangeType::Automatic => "Automatic",
            PriceChangeType::Campaign => "Campaign",
            PriceChangeType::Competitive => "Competitive",
        }
    }
}

impl std::fmt::Display for PriceChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriceChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manual" => Ok(PriceChangeType::Manual),
            "Automatic" => Ok(PriceChangeType::Automatic),
            "Campaign" => Ok(PriceChangeType::Campaign),
            "Competitive" => Ok(PriceChangeType::Competitive),
            other => Err(format!("unknown price change type: {other}")),
        }
    }
}

/// One stock ledger row.
///
/// `integration_id` is `None` for the product's own quantity and
/// `Some(..)` for the mirrored quantity of a listing on that integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistory {
    pub id: HistoryId,
    pub product_id: ProductId,
    pub integration_id: Option<IntegrationId>,
    pub previous_quantity: u32,
    pub new_quantity: u32,
    pub change_quantity: i64,
    pub change_type: StockChangeType,
    pub reason: Option<String>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl StockHistory {
    pub(crate) fn record(
        product_id: ProductId,
        integration_id: Option<IntegrationId>,
        previous_quantity: u32,
        new_quantity: u32,
        change_type: StockChangeType,
        reason: Option<String>,
        order_id: Option<OrderId>,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            product_id,
            integration_id,
            previous_quantity,
            new_quantity,
            change_quantity: new_quantity as i64 - previous_quantity as i64,
            change_type,
            reason,
            order_id,
            created_at: Utc::now(),
        }
    }
}

/// One price ledger row. `integration_id` follows the same convention as
/// [`StockHistory`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: HistoryId,
    pub product_id: ProductId,
    pub integration_id: Option<IntegrationId>,
    pub previous_price: Money,
    pub new_price: Money,
    pub change_type: PriceChangeType,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PriceHistory {
    pub(crate) fn record(
        product_id: ProductId,
        integration_id: Option<IntegrationId>,
        previous_price: Money,
        new_price: Money,
        change_type: PriceChangeType,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: HistoryId::new(),
            product_id,
            integration_id,
            previous_price,
            new_price,
            change_type,
            reason,
            created_at: Utc::now(),
        }
    }
}
