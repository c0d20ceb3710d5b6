//! Product catalog: products, their platform listings and the stock/price
//! mutation paths.

mod listing;
mod product;
mod service;

pub use listing::{ListingAction, ProductPlatform, ProductSyncItem, plan_product_sync};
pub use product::{DEFAULT_MIN_STOCK_LEVEL, PriceStrategy, Product, StockStatus};
pub use service::{
    CatalogService, MIRROR_SYNC_REASON, PriceChange, StockChange, apply_price_change,
    apply_stock_change, update_mirror,
};
