//! Stock and price mutations, and the catalog service built on them.
//!
//! Every change to a product's stock or price, and to a listing's mirrored
//! stock or price, goes through this module so that the ledger row is written
//! in the same transaction as the change.

use common::{IntegrationId, Money, OrderId, ProductId, StoreId};

use super::{Product, ProductPlatform};
use crate::error::{DomainError, Result};
use crate::ledger::{PriceChangeType, PriceHistory, StockChangeType, StockHistory};
use crate::repository::{
    IntegrationRepository, LedgerRepository, ListingRepository, ProductRepository,
    StoreRepository, Transaction, UnitOfWork, finish,
};
use crate::store::{Category, Store};

/// Reason recorded on ledger rows written for mirror updates.
pub const MIRROR_SYNC_REASON: &str = "platform sync";

/// A relative change to a product's stock quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: ProductId,
    pub delta: i64,
    pub change_type: StockChangeType,
    pub reason: Option<String>,
    pub order_id: Option<OrderId>,
}

impl StockChange {
    pub fn new(product_id: ProductId, delta: i64, change_type: StockChangeType) -> Self {
        Self {
            product_id,
            delta,
            change_type,
            reason: None,
            order_id: None,
        }
    }

    /// Stock leaving through an order line.
    pub fn sale(product_id: ProductId, quantity: u32, order_id: OrderId) -> Self {
        Self::new(product_id, -(quantity as i64), StockChangeType::Sale).for_order(order_id)
    }

    /// Stock coming back from a cancelled or returned order line.
    pub fn order_return(product_id: ProductId, quantity: u32, order_id: OrderId) -> Self {
        Self::new(product_id, quantity as i64, StockChangeType::Return).for_order(order_id)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

/// A new base price for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChange {
    pub product_id: ProductId,
    pub new_price: Money,
    pub change_type: PriceChangeType,
    pub reason: Option<String>,
}

impl PriceChange {
    pub fn new(product_id: ProductId, new_price: Money, change_type: PriceChangeType) -> Self {
        Self {
            product_id,
            new_price,
            change_type,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Applies a stock delta to a product inside `tx`.
///
/// The stock status is recomputed and exactly one ledger row is appended. A
/// zero delta changes nothing and writes no row. A result below zero fails
/// with `InsufficientStock` and leaves the transaction untouched.
pub async fn apply_stock_change<T: Transaction>(tx: &mut T, change: &StockChange) -> Result<Product> {
    let mut product = tx
        .lock_product(change.product_id)
        .await?
        .ok_or(DomainError::ProductNotFound(change.product_id))?;

    if change.delta == 0 {
        return Ok(product);
    }

    let previous = product.stock_quantity();
    let target = previous as i64 + change.delta;
    if target < 0 {
        return Err(DomainError::InsufficientStock {
            product_id: product.id,
            available: previous,
            requested: change.delta.unsigned_abs(),
        });
    }
    let new_quantity = u32::try_from(target).map_err(|_| DomainError::InvalidQuantity {
        product_id: product.id,
        quantity: target,
    })?;

    product.set_stock_quantity(new_quantity);
    tx.update_product(&product).await?;
    tx.append_stock_history(&StockHistory::record(
        product.id,
        None,
        previous,
        new_quantity,
        change.change_type,
        change.reason.clone(),
        change.order_id,
    ))
    .await?;

    metrics::counter!("stock_changes_total", "change_type" => change.change_type.as_str())
        .increment(1);
    tracing::debug!(
        product_id = %product.id,
        previous,
        new_quantity,
        change_type = %change.change_type,
        "stock changed"
    );
    Ok(product)
}

/// Sets a product's base price inside `tx`, appending one ledger row.
///
/// An unchanged price is a no-op. Prices must be strictly positive.
pub async fn apply_price_change<T: Transaction>(tx: &mut T, change: &PriceChange) -> Result<Product> {
    if !change.new_price.is_positive() {
        return Err(DomainError::InvalidPrice {
            cents: change.new_price.cents(),
        });
    }
    let mut product = tx
        .lock_product(change.product_id)
        .await?
        .ok_or(DomainError::ProductNotFound(change.product_id))?;

    let previous = product.base_price;
    if previous == change.new_price {
        return Ok(product);
    }

    product.set_base_price(change.new_price);
    tx.update_product(&product).await?;
    tx.append_price_history(&PriceHistory::record(
        product.id,
        None,
        previous,
        change.new_price,
        change.change_type,
        change.reason.clone(),
    ))
    .await?;

    metrics::counter!("price_changes_total", "change_type" => change.change_type.as_str())
        .increment(1);
    tracing::debug!(
        product_id = %product.id,
        previous = %previous,
        new_price = %change.new_price,
        "price changed"
    );
    Ok(product)
}

/// Writes a listing's new mirror state, auditing changed mirror values.
///
/// `previous` is `None` when the listing row does not exist yet; the row is
/// then inserted and compared against an empty mirror.
pub async fn update_mirror<T: Transaction>(
    tx: &mut T,
    previous: Option<&ProductPlatform>,
    updated: &ProductPlatform,
) -> Result<()> {
    let (previous_price, previous_stock) = match previous {
        Some(row) => {
            tx.update_listing(updated).await?;
            (row.platform_price, row.platform_stock_quantity)
        }
        None => {
            tx.insert_listing(updated).await?;
            (Money::zero(), 0)
        }
    };

    if previous_price != updated.platform_price {
        tx.append_price_history(&PriceHistory::record(
            updated.product_id,
            Some(updated.integration_id),
            previous_price,
            updated.platform_price,
            PriceChangeType::Automatic,
            Some(MIRROR_SYNC_REASON.to_string()),
        ))
        .await?;
    }
    if previous_stock != updated.platform_stock_quantity {
        tx.append_stock_history(&StockHistory::record(
            updated.product_id,
            Some(updated.integration_id),
            previous_stock,
            updated.platform_stock_quantity,
            StockChangeType::Sync,
            Some(MIRROR_SYNC_REASON.to_string()),
            None,
        ))
        .await?;
    }
    Ok(())
}

/// Stores, categories, products and their listings.
pub struct CatalogService<U: UnitOfWork> {
    uow: U,
}

impl<U: UnitOfWork> CatalogService<U> {
    pub fn new(uow: U) -> Self {
        Self { uow }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_store(&self, name: &str) -> Result<Store> {
        let store = Store::new(name);
        let mut tx = self.uow.begin().await?;
        let result = tx
            .insert_store(&store)
            .await
            .map(|_| store)
            .map_err(DomainError::from);
        finish(tx, result).await
    }

    #[tracing::instrument(skip(self, category), fields(name = %category.name))]
    pub async fn create_category(&self, category: Category) -> Result<Category> {
        let mut tx = self.uow.begin().await?;
        let result: Result<Category> = async {
            if let Some(parent_id) = category.parent_id {
                tx.get_category(parent_id)
                    .await?
                    .ok_or(DomainError::CategoryNotFound(parent_id))?;
            }
            tx.insert_category(&category).await?;
            Ok(category)
        }
        .await;
        finish(tx, result).await
    }

    /// Inserts a product. Initial stock is recorded as one `Restock` row.
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn create_product(&self, product: Product) -> Result<Product> {
        if !product.base_price.is_positive() {
            return Err(DomainError::InvalidPrice {
                cents: product.base_price.cents(),
            });
        }
        let mut tx = self.uow.begin().await?;
        let result: Result<Product> = async {
            tx.get_store(product.store_id)
                .await?
                .ok_or(DomainError::StoreNotFound(product.store_id))?;
            tx.get_category(product.category_id)
                .await?
                .ok_or(DomainError::CategoryNotFound(product.category_id))?;
            tx.insert_product(&product).await?;
            if product.stock_quantity() > 0 {
                tx.append_stock_history(&StockHistory::record(
                    product.id,
                    None,
                    0,
                    product.stock_quantity(),
                    StockChangeType::Restock,
                    Some("initial stock".to_string()),
                    None,
                ))
                .await?;
            }
            Ok(product)
        }
        .await;
        finish(tx, result).await
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product> {
        let mut tx = self.uow.begin().await?;
        let result = tx.get_product(id).await;
        let result = match result {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(DomainError::ProductNotFound(id)),
            Err(err) => Err(err.into()),
        };
        finish(tx, result).await
    }

    pub async fn products_by_store(&self, store_id: StoreId) -> Result<Vec<Product>> {
        let mut tx = self.uow.begin().await?;
        let result = tx.products_by_store(store_id).await.map_err(DomainError::from);
        finish(tx, result).await
    }

    /// Active products of a store that are low on or out of stock.
    pub async fn low_stock_products(&self, store_id: StoreId) -> Result<Vec<Product>> {
        let products = self.products_by_store(store_id).await?;
        Ok(products.into_iter().filter(Product::needs_restock).collect())
    }

    #[tracing::instrument(skip(self))]
    pub async fn apply_stock_change(&self, change: StockChange) -> Result<Product> {
        let mut tx = self.uow.begin().await?;
        let result = apply_stock_change(&mut tx, &change).await;
        finish(tx, result).await
    }

    /// Sets an absolute stock quantity, recorded as the matching delta.
    #[tracing::instrument(skip(self))]
    pub async fn update_stock(
        &self,
        product_id: ProductId,
        new_quantity: u32,
        change_type: StockChangeType,
        reason: Option<String>,
    ) -> Result<Product> {
        let mut tx = self.uow.begin().await?;
        let result: Result<Product> = async {
            let current = tx
                .lock_product(product_id)
                .await?
                .ok_or(DomainError::ProductNotFound(product_id))?
                .stock_quantity();
            let mut change =
                StockChange::new(product_id, new_quantity as i64 - current as i64, change_type);
            change.reason = reason;
            apply_stock_change(&mut tx, &change).await
        }
        .await;
        finish(tx, result).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_price(
        &self,
        product_id: ProductId,
        new_price: Money,
        change_type: PriceChangeType,
        reason: Option<String>,
    ) -> Result<Product> {
        let change = PriceChange {
            product_id,
            new_price,
            change_type,
            reason,
        };
        let mut tx = self.uow.begin().await?;
        let result = apply_price_change(&mut tx, &change).await;
        finish(tx, result).await
    }

    /// Creates the unlisted mirror row for a product on an integration.
    #[tracing::instrument(skip(self))]
    pub async fn attach_listing(
        &self,
        product_id: ProductId,
        integration_id: IntegrationId,
        auto_sync: bool,
    ) -> Result<ProductPlatform> {
        let mut tx = self.uow.begin().await?;
        let result: Result<ProductPlatform> = async {
            let product = tx
                .get_product(product_id)
                .await?
                .ok_or(DomainError::ProductNotFound(product_id))?;
            let integration = tx
                .get_integration(integration_id)
                .await?
                .ok_or(DomainError::IntegrationNotFound(integration_id))?;
            if product.store_id != integration.store_id {
                return Err(DomainError::StoreMismatch {
                    entity: "integration",
                    expected: product.store_id,
                    actual: integration.store_id,
                });
            }
            let listing = ProductPlatform::unlisted(product_id, integration_id, auto_sync);
            tx.insert_listing(&listing).await?;
            Ok(listing)
        }
        .await;
        finish(tx, result).await
    }

    pub async fn listing(
        &self,
        product_id: ProductId,
        integration_id: IntegrationId,
    ) -> Result<Option<ProductPlatform>> {
        let mut tx = self.uow.begin().await?;
        let result = tx
            .get_listing(product_id, integration_id)
            .await
            .map_err(DomainError::from);
        finish(tx, result).await
    }

    pub async fn stock_history(&self, product_id: ProductId) -> Result<Vec<StockHistory>> {
        let mut tx = self.uow.begin().await?;
        let result = tx.stock_history(product_id).await.map_err(DomainError::from);
        finish(tx, result).await
    }

    pub async fn price_history(&self, product_id: ProductId) -> Result<Vec<PriceHistory>> {
        let mut tx = self.uow.begin().await?;
        let result = tx.price_history(product_id).await.map_err(DomainError::from);
        finish(tx, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StockStatus;
    use crate::repository::InMemoryUnitOfWork;

    async fn setup(stock: u32) -> (CatalogService<InMemoryUnitOfWork>, Product) {
        let service = CatalogService::new(InMemoryUnitOfWork::new());
        let store = service.create_store("Main").await.unwrap();
        let category = service.create_category(Category::new("Toys")).await.unwrap();
        let product = service
            .create_product(
                Product::new(store.id, category.id, "Widget", Money::from_cents(1000))
                    .with_stock(stock, 5),
            )
            .await
            .unwrap();
        (service, product)
    }

    #[tokio::test]
    async fn test_sale_to_zero_records_one_row() {
        let (service, product) = setup(3).await;
        assert_eq!(product.stock_status(), StockStatus::LowStock);
        let before = service.stock_history(product.id).await.unwrap().len();

        let updated = service
            .apply_stock_change(StockChange::new(product.id, -3, StockChangeType::Sale))
            .await
            .unwrap();

        assert_eq!(updated.stock_quantity(), 0);
        assert_eq!(updated.stock_status(), StockStatus::OutOfStock);
        let history = service.stock_history(product.id).await.unwrap();
        assert_eq!(history.len(), before + 1);
        let row = history.last().unwrap();
        assert_eq!(row.previous_quantity, 3);
        assert_eq!(row.new_quantity, 0);
        assert_eq!(row.change_type, StockChangeType::Sale);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let (service, product) = setup(2).await;
        let before = service.stock_history(product.id).await.unwrap();

        let err = service
            .apply_stock_change(StockChange::new(product.id, -3, StockChangeType::Sale))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            }
        ));
        assert_eq!(service.get_product(product.id).await.unwrap().stock_quantity(), 2);
        assert_eq!(service.stock_history(product.id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_initial_stock_is_recorded_as_restock() {
        let (service, product) = setup(12).await;
        let history = service.stock_history(product.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].change_type, StockChangeType::Restock);
        assert_eq!(history[0].change_quantity, 12);
    }

    #[tokio::test]
    async fn test_update_stock_records_delta_and_skips_no_op() {
        let (service, product) = setup(10).await;

        service
            .update_stock(product.id, 4, StockChangeType::Adjustment, Some("count".into()))
            .await
            .unwrap();
        service
            .update_stock(product.id, 4, StockChangeType::Adjustment, None)
            .await
            .unwrap();

        let history = service.stock_history(product.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].change_quantity, -6);
        assert_eq!(history[1].reason.as_deref(), Some("count"));
    }

    #[tokio::test]
    async fn test_price_changes_are_audited() {
        let (service, product) = setup(10).await;

        let updated = service
            .update_price(product.id, Money::from_cents(1250), PriceChangeType::Campaign, None)
            .await
            .unwrap();
        assert_eq!(updated.base_price, Money::from_cents(1250));

        let err = service
            .update_price(product.id, Money::zero(), PriceChangeType::Manual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidPrice { cents: 0 }));

        let history = service.price_history(product.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_price, Money::from_cents(1000));
        assert_eq!(history[0].integration_id, None);
    }

    #[tokio::test]
    async fn test_low_stock_report() {
        let (service, product) = setup(3).await;
        let low = service.low_stock_products(product.store_id).await.unwrap();
        assert_eq!(low.len(), 1);

        service
            .update_stock(product.id, 50, StockChangeType::Restock, None)
            .await
            .unwrap();
        assert!(service.low_stock_products(product.store_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_product_requires_store() {
        let service = CatalogService::new(InMemoryUnitOfWork::new());
        let category = service.create_category(Category::new("Toys")).await.unwrap();
        let orphan = Product::new(StoreId::new(), category.id, "Widget", Money::from_cents(10));

        let err = service.create_product(orphan).await.unwrap_err();
        assert!(matches!(err, DomainError::StoreNotFound(_)));
    }
}
