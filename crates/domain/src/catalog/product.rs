//! Product entity and its derived stock status.

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, ProductId, StoreId};
use serde::{Deserialize, Serialize};

/// Default threshold at or below which a product is reported as low on stock.
pub const DEFAULT_MIN_STOCK_LEVEL: u32 = 5;

/// Stock availability, always derived from quantity and the minimum level.
///
/// ```text
/// quantity == 0                 → OutOfStock
/// 0 < quantity <= min_level     → LowStock
/// quantity > min_level          → InStock
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Computes the status for a quantity against a minimum stock level.
    pub fn from_levels(quantity: u32, min_stock_level: u32) -> Self {
        if quantity == 0 {
            StockStatus::OutOfStock
        } else if quantity <= min_stock_level {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "InStock",
            StockStatus::LowStock => "LowStock",
            StockStatus::OutOfStock => "OutOfStock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing policy label carried on a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PriceStrategy {
    #[default]
    Fixed,
    CompetitiveBased,
    DemandBased,
    MarketBased,
    Dynamic,
}

impl PriceStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceStrategy::Fixed => "Fixed",
            PriceStrategy::CompetitiveBased => "CompetitiveBased",
            PriceStrategy::DemandBased => "DemandBased",
            PriceStrategy::MarketBased => "MarketBased",
            PriceStrategy::Dynamic => "Dynamic",
        }
    }
}

impl std::str::FromStr for PriceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Fixed" => Ok(PriceStrategy::Fixed),
            "CompetitiveBased" => Ok(PriceStrategy::CompetitiveBased),
            "DemandBased" => Ok(PriceStrategy::DemandBased),
            "MarketBased" => Ok(PriceStrategy::MarketBased),
            "Dynamic" => Ok(PriceStrategy::Dynamic),
            other => Err(format!("unknown price strategy: {other}")),
        }
    }
}

/// A catalog item owned by a store.
///
/// Stock quantity, minimum level and stock status are private: the status is
/// recomputed whenever either input changes, so it can never drift from its
/// definition. Quantities are unsigned, so a negative stock level is not
/// representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub name: String,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub description: Option<String>,
    pub base_price: Money,
    pub cost_price: Option<Money>,
    stock_quantity: u32,
    min_stock_level: u32,
    stock_status: StockStatus,
    pub price_strategy: PriceStrategy,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product with no stock.
    pub fn new(
        store_id: StoreId,
        category_id: CategoryId,
        name: impl Into<String>,
        base_price: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            store_id,
            category_id,
            name: name.into(),
            sku: None,
            barcode: None,
            description: None,
            base_price,
            cost_price: None,
            stock_quantity: 0,
            min_stock_level: DEFAULT_MIN_STOCK_LEVEL,
            stock_status: StockStatus::OutOfStock,
            price_strategy: PriceStrategy::Fixed,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    /// Sets stock levels on a product being built or loaded from storage.
    ///
    /// This bypasses the ledger; live mutations go through
    /// [`apply_stock_change`](crate::catalog::apply_stock_change).
    pub fn with_stock(mut self, quantity: u32, min_stock_level: u32) -> Self {
        self.stock_quantity = quantity;
        self.min_stock_level = min_stock_level;
        self.stock_status = StockStatus::from_levels(quantity, min_stock_level);
        self
    }

    pub fn stock_quantity(&self) -> u32 {
        self.stock_quantity
    }

    pub fn min_stock_level(&self) -> u32 {
        self.min_stock_level
    }

    /// Derived from quantity and threshold on every stock change.
    pub fn stock_status(&self) -> StockStatus {
        self.stock_status
    }

    /// Changes the low-stock threshold and recomputes the status.
    pub fn set_min_stock_level(&mut self, min_stock_level: u32) {
        self.min_stock_level = min_stock_level;
        self.stock_status = StockStatus::from_levels(self.stock_quantity, min_stock_level);
        self.updated_at = Utc::now();
    }

    pub(crate) fn set_stock_quantity(&mut self, quantity: u32) {
        self.stock_quantity = quantity;
        self.stock_status = StockStatus::from_levels(quantity, self.min_stock_level);
        self.updated_at = Utc::now();
    }

    pub(crate) fn set_base_price(&mut self, price: Money) {
        self.base_price = price;
        self.updated_at = Utc::now();
    }

    /// Returns true if the product should appear in low-stock reports.
    pub fn needs_restock(&self) -> bool {
        self.is_active && self.stock_status != StockStatus::InStock
    }
}
