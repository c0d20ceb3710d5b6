//! Domain layer of the commerce back office.
//!
//! This crate provides:
//! - Stores, categories and the product catalog with its stock/price rules
//! - The append-only stock and price ledger
//! - Platform orders with their status machine and idempotent ingest
//! - The integration registry
//! - Unit-of-work and repository ports, with an in-memory implementation

pub mod catalog;
pub mod error;
pub mod integration;
pub mod ledger;
pub mod order;
pub mod repository;
pub mod store;

pub use catalog::{
    CatalogService, ListingAction, PriceChange, PriceStrategy, Product, ProductPlatform,
    ProductSyncItem, StockChange, StockStatus,
};
pub use error::{DomainError, Result};
pub use integration::{
    IntegrationRegistry, NewIntegration, PlatformIntegration, PlatformType, SyncStatus,
};
pub use ledger::{PriceChangeType, PriceHistory, StockChangeType, StockHistory};
pub use order::{
    IngestOutcome, Order, OrderItem, OrderService, OrderStatus, OrderStatusUpdate, RawOrder,
    RawOrderItem,
};
pub use repository::{
    InMemoryTransaction, InMemoryUnitOfWork, PersistenceError, Transaction, UnitOfWork, finish,
};
pub use store::{Category, Store};
