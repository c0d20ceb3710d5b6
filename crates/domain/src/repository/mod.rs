//! Unit-of-work and repository ports.
//!
//! A [`UnitOfWork`] hands out [`Transaction`] handles. Every repository
//! operation runs against an explicit transaction; nothing is visible to other
//! transactions until [`Transaction::commit`]. Dropping a transaction without
//! committing discards its writes.
//!
//! The usual shape of a unit of work is:
//!
//! ```ignore
//! let mut tx = uow.begin().await?;
//! let result = do_work(&mut tx).await;
//! finish(tx, result).await
//! ```

mod memory;

pub use memory::{InMemoryTransaction, InMemoryUnitOfWork};

use async_trait::async_trait;
use common::{CategoryId, IntegrationId, OrderId, ProductId, StoreId};
use thiserror::Error;

use crate::catalog::{Product, ProductPlatform};
use crate::integration::{PlatformIntegration, PlatformType};
use crate::ledger::{PriceHistory, StockHistory};
use crate::order::{Order, OrderItem, OrderStatus};
use crate::store::{Category, Store};

/// Errors raised by persistence backends.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A uniqueness rule rejected the write.
    #[error("Conflict on {entity}: {key}")]
    Conflict { entity: &'static str, key: String },

    /// An update targeted a row that does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The transaction was rolled back by the backend.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// A stored value could not be decoded.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;

#[async_trait]
pub trait StoreRepository: Send {
    async fn get_store(&mut self, id: StoreId) -> Result<Option<Store>>;
    async fn insert_store(&mut self, store: &Store) -> Result<()>;
    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>>;
    async fn insert_category(&mut self, category: &Category) -> Result<()>;
}

#[async_trait]
pub trait ProductRepository: Send {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Loads a product and locks its row until the transaction ends.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>>;
    async fn products_by_store(&mut self, store_id: StoreId) -> Result<Vec<Product>>;
    async fn find_product_by_sku(&mut self, store_id: StoreId, sku: &str)
    -> Result<Option<Product>>;
    async fn insert_product(&mut self, product: &Product) -> Result<()>;
    async fn update_product(&mut self, product: &Product) -> Result<()>;
}

#[async_trait]
pub trait ListingRepository: Send {
    async fn get_listing(
        &mut self,
        product_id: ProductId,
        integration_id: IntegrationId,
    ) -> Result<Option<ProductPlatform>>;

    async fn listings_by_integration(
        &mut self,
        integration_id: IntegrationId,
    ) -> Result<Vec<ProductPlatform>>;

    /// Listings currently published on the platform.
    async fn listed(&mut self, integration_id: IntegrationId) -> Result<Vec<ProductPlatform>>;

    async fn find_listing_by_platform_product(
        &mut self,
        integration_id: IntegrationId,
        platform_product_id: &str,
    ) -> Result<Option<ProductPlatform>>;

    /// Fails with `Conflict` if the (product, integration) pair already has a row.
    async fn insert_listing(&mut self, listing: &ProductPlatform) -> Result<()>;
    async fn update_listing(&mut self, listing: &ProductPlatform) -> Result<()>;
}

#[async_trait]
pub trait IntegrationRepository: Send {
    async fn get_integration(&mut self, id: IntegrationId)
    -> Result<Option<PlatformIntegration>>;

    /// Loads an integration and locks its row until the transaction ends.
    async fn lock_integration(
        &mut self,
        id: IntegrationId,
    ) -> Result<Option<PlatformIntegration>>;

    async fn integrations_by_store(&mut self, store_id: StoreId)
    -> Result<Vec<PlatformIntegration>>;
    async fn active_integrations(&mut self) -> Result<Vec<PlatformIntegration>>;

    async fn find_active_integration(
        &mut self,
        store_id: StoreId,
        platform_type: &PlatformType,
    ) -> Result<Option<PlatformIntegration>>;

    /// Fails with `Conflict` if another active integration exists for the
    /// same (store, platform) pair.
    async fn insert_integration(&mut self, integration: &PlatformIntegration) -> Result<()>;
    async fn update_integration(&mut self, integration: &PlatformIntegration) -> Result<()>;

    /// Fails with `Conflict` while listings or orders still reference it.
    async fn delete_integration(&mut self, id: IntegrationId) -> Result<()>;
}

#[async_trait]
pub trait OrderRepository: Send {
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_platform_id(
        &mut self,
        integration_id: IntegrationId,
        platform_order_id: &str,
    ) -> Result<Option<Order>>;

    async fn orders_by_integration(&mut self, integration_id: IntegrationId)
    -> Result<Vec<Order>>;
    async fn orders_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Inserts an order with its items. Fails with `Conflict` if the
    /// (integration, platform order id) pair already exists.
    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<()>;
    async fn update_order(&mut self, order: &Order) -> Result<()>;
    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;
}

/// The audit ledger is append-only: there is no update or delete.
#[async_trait]
pub trait LedgerRepository: Send {
    async fn append_stock_history(&mut self, entry: &StockHistory) -> Result<()>;
    async fn append_price_history(&mut self, entry: &PriceHistory) -> Result<()>;

    /// Stock rows of a product, oldest first.
    async fn stock_history(&mut self, product_id: ProductId) -> Result<Vec<StockHistory>>;

    /// Price rows of a product, oldest first.
    async fn price_history(&mut self, product_id: ProductId) -> Result<Vec<PriceHistory>>;
}

/// A transaction-scoped handle over every repository.
#[async_trait]
pub trait Transaction:
    StoreRepository
    + ProductRepository
    + ListingRepository
    + IntegrationRepository
    + OrderRepository
    + LedgerRepository
    + Send
    + Sized
{
    /// Makes every write of this transaction visible atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every write of this transaction.
    async fn rollback(self) -> Result<()>;
}

/// Source of transactions.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    type Tx: Transaction;

    async fn begin(&self) -> Result<Self::Tx>;
}

/// Ends a unit of work: commits on `Ok`, rolls back on `Err`.
///
/// The caller's error is returned unchanged; a rollback failure is only
/// logged. A commit failure is converted into the caller's error type.
pub async fn finish<Tx, T, E>(tx: Tx, result: std::result::Result<T, E>) -> std::result::Result<T, E>
where
    Tx: Transaction,
    E: From<PersistenceError>,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
