use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{CategoryId, IntegrationId, ListingId, OrderId, ProductId, StoreId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    IntegrationRepository, LedgerRepository, ListingRepository, OrderRepository,
    PersistenceError, ProductRepository, Result, StoreRepository, Transaction, UnitOfWork,
};
use crate::catalog::{Product, ProductPlatform};
use crate::integration::{PlatformIntegration, PlatformType};
use crate::ledger::{PriceHistory, StockHistory};
use crate::order::{Order, OrderItem, OrderStatus};
use crate::store::{Category, Store};

#[derive(Debug, Clone, Default)]
struct Tables {
    stores: HashMap<StoreId, Store>,
    categories: HashMap<CategoryId, Category>,
    products: HashMap<ProductId, Product>,
    listings: HashMap<ListingId, ProductPlatform>,
    integrations: HashMap<IntegrationId, PlatformIntegration>,
    orders: HashMap<OrderId, Order>,
    order_items: HashMap<OrderId, Vec<OrderItem>>,
    stock_history: Vec<StockHistory>,
    price_history: Vec<PriceHistory>,
}

/// In-memory unit of work for tests and the demo server.
///
/// Transactions are serialized: `begin` takes an exclusive lock on the tables
/// which is held until the transaction is committed, rolled back or dropped.
/// Writes go to a private copy that replaces the tables on commit.
#[derive(Clone, Default)]
pub struct InMemoryUnitOfWork {
    tables: Arc<Mutex<Tables>>,
    failing_commits: Arc<AtomicUsize>,
}

impl InMemoryUnitOfWork {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with `TransactionAborted`.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let guard = self.tables.clone().lock_owned().await;
        Ok(InMemoryTransaction {
            guard,
            work: None,
            failing_commits: self.failing_commits.clone(),
        })
    }
}

/// Transaction over [`InMemoryUnitOfWork`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    work: Option<Tables>,
    failing_commits: Arc<AtomicUsize>,
}

impl InMemoryTransaction {
    fn read(&self) -> &Tables {
        match &self.work {
            Some(work) => work,
            None => &self.guard,
        }
    }

    fn write(&mut self) -> &mut Tables {
        let committed = &self.guard;
        self.work.get_or_insert_with(|| (**committed).clone())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn sorted<T: Clone>(items: impl Iterator<Item = T>, key: impl Fn(&T) -> String) -> Vec<T> {
    let mut items: Vec<T> = items.collect();
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl StoreRepository for InMemoryTransaction {
    async fn get_store(&mut self, id: StoreId) -> Result<Option<Store>> {
        Ok(self.read().stores.get(&id).cloned())
    }

    async fn insert_store(&mut self, store: &Store) -> Result<()> {
        self.write().stores.insert(store.id, store.clone());
        Ok(())
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.read().categories.get(&id).cloned())
    }

    async fn insert_category(&mut self, category: &Category) -> Result<()> {
        self.write().categories.insert(category.id, category.clone());
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.read().products.get(&id).cloned())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        self.get_product(id).await
    }

    async fn products_by_store(&mut self, store_id: StoreId) -> Result<Vec<Product>> {
        Ok(sorted(
            self.read()
                .products
                .values()
                .filter(|p| p.store_id == store_id)
                .cloned(),
            |p| p.name.clone(),
        ))
    }

    async fn find_product_by_sku(
        &mut self,
        store_id: StoreId,
        sku: &str,
    ) -> Result<Option<Product>> {
        Ok(self
            .read()
            .products
            .values()
            .find(|p| p.store_id == store_id && p.sku.as_deref() == Some(sku))
            .cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        self.write().products.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        let tables = self.write();
        match tables.products.get_mut(&product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound {
                entity: "product",
                id: product.id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ListingRepository for InMemoryTransaction {
    async fn get_listing(
        &mut self,
        product_id: ProductId,
        integration_id: IntegrationId,
    ) -> Result<Option<ProductPlatform>> {
        Ok(self
            .read()
            .listings
            .values()
            .find(|l| l.product_id == product_id && l.integration_id == integration_id)
            .cloned())
    }

    async fn listings_by_integration(
        &mut self,
        integration_id: IntegrationId,
    ) -> Result<Vec<ProductPlatform>> {
        Ok(sorted(
            self.read()
                .listings
                .values()
                .filter(|l| l.integration_id == integration_id)
                .cloned(),
            |l| l.id.to_string(),
        ))
    }

    async fn listed(&mut self, integration_id: IntegrationId) -> Result<Vec<ProductPlatform>> {
        Ok(self
            .listings_by_integration(integration_id)
            .await?
            .into_iter()
            .filter(|l| l.is_listed)
            .collect())
    }

    async fn find_listing_by_platform_product(
        &mut self,
        integration_id: IntegrationId,
        platform_product_id: &str,
    ) -> Result<Option<ProductPlatform>> {
        Ok(self
            .read()
            .listings
            .values()
            .find(|l| {
                l.integration_id == integration_id
                    && l.platform_product_id.as_deref() == Some(platform_product_id)
            })
            .cloned())
    }

    async fn insert_listing(&mut self, listing: &ProductPlatform) -> Result<()> {
        let tables = self.write();
        if tables.listings.values().any(|l| {
            l.product_id == listing.product_id && l.integration_id == listing.integration_id
        }) {
            return Err(PersistenceError::Conflict {
                entity: "listing",
                key: format!("({}, {})", listing.product_id, listing.integration_id),
            });
        }
        tables.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update_listing(&mut self, listing: &ProductPlatform) -> Result<()> {
        let tables = self.write();
        match tables.listings.get_mut(&listing.id) {
            Some(existing) => {
                *existing = listing.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound {
                entity: "listing",
                id: listing.id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl IntegrationRepository for InMemoryTransaction {
    async fn get_integration(
        &mut self,
        id: IntegrationId,
    ) -> Result<Option<PlatformIntegration>> {
        Ok(self.read().integrations.get(&id).cloned())
    }

    async fn lock_integration(
        &mut self,
        id: IntegrationId,
    ) -> Result<Option<PlatformIntegration>> {
        // The table lock already serializes transactions.
        self.get_integration(id).await
    }

    async fn integrations_by_store(
        &mut self,
        store_id: StoreId,
    ) -> Result<Vec<PlatformIntegration>> {
        Ok(sorted(
            self.read()
                .integrations
                .values()
                .filter(|i| i.store_id == store_id)
                .cloned(),
            |i| i.created_at.to_rfc3339(),
        ))
    }

    async fn active_integrations(&mut self) -> Result<Vec<PlatformIntegration>> {
        Ok(sorted(
            self.read()
                .integrations
                .values()
                .filter(|i| i.is_active)
                .cloned(),
            |i| i.created_at.to_rfc3339(),
        ))
    }

    async fn find_active_integration(
        &mut self,
        store_id: StoreId,
        platform_type: &PlatformType,
    ) -> Result<Option<PlatformIntegration>> {
        Ok(self
            .read()
            .integrations
            .values()
            .find(|i| i.is_active && i.store_id == store_id && &i.platform_type == platform_type)
            .cloned())
    }

    async fn insert_integration(&mut self, integration: &PlatformIntegration) -> Result<()> {
        let tables = self.write();
        check_active_pair(tables, integration)?;
        tables
            .integrations
            .insert(integration.id, integration.clone());
        Ok(())
    }

    async fn update_integration(&mut self, integration: &PlatformIntegration) -> Result<()> {
        let tables = self.write();
        check_active_pair(tables, integration)?;
        match tables.integrations.get_mut(&integration.id) {
            Some(existing) => {
                *existing = integration.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound {
                entity: "integration",
                id: integration.id.to_string(),
            }),
        }
    }

    async fn delete_integration(&mut self, id: IntegrationId) -> Result<()> {
        let tables = self.write();
        let referenced = tables.listings.values().any(|l| l.integration_id == id)
            || tables.orders.values().any(|o| o.integration_id == id);
        if referenced {
            return Err(PersistenceError::Conflict {
                entity: "integration",
                key: format!("{id} is referenced by listings or orders"),
            });
        }
        match tables.integrations.remove(&id) {
            Some(_) => Ok(()),
            None => Err(PersistenceError::NotFound {
                entity: "integration",
                id: id.to_string(),
            }),
        }
    }
}

fn check_active_pair(tables: &Tables, integration: &PlatformIntegration) -> Result<()> {
    if !integration.is_active {
        return Ok(());
    }
    let duplicate = tables.integrations.values().any(|i| {
        i.id != integration.id
            && i.is_active
            && i.store_id == integration.store_id
            && i.platform_type == integration.platform_type
    });
    if duplicate {
        return Err(PersistenceError::Conflict {
            entity: "active integration",
            key: format!(
                "({}, {})",
                integration.store_id, integration.platform_type
            ),
        });
    }
    Ok(())
}

#[async_trait]
impl OrderRepository for InMemoryTransaction {
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.read().orders.get(&id).cloned())
    }

    async fn find_order_by_platform_id(
        &mut self,
        integration_id: IntegrationId,
        platform_order_id: &str,
    ) -> Result<Option<Order>> {
        Ok(self
            .read()
            .orders
            .values()
            .find(|o| o.integration_id == integration_id && o.platform_order_id == platform_order_id)
            .cloned())
    }

    async fn orders_by_integration(
        &mut self,
        integration_id: IntegrationId,
    ) -> Result<Vec<Order>> {
        Ok(sorted(
            self.read()
                .orders
                .values()
                .filter(|o| o.integration_id == integration_id)
                .cloned(),
            |o| o.order_number.clone(),
        ))
    }

    async fn orders_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(sorted(
            self.read()
                .orders
                .values()
                .filter(|o| o.status == status)
                .cloned(),
            |o| o.order_number.clone(),
        ))
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<()> {
        let tables = self.write();
        if tables.orders.values().any(|o| {
            o.integration_id == order.integration_id
                && o.platform_order_id == order.platform_order_id
        }) {
            return Err(PersistenceError::Conflict {
                entity: "order",
                key: format!("({}, {})", order.integration_id, order.platform_order_id),
            });
        }
        tables.orders.insert(order.id, order.clone());
        tables.order_items.insert(order.id, items.to_vec());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let tables = self.write();
        match tables.orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound {
                entity: "order",
                id: order.id.to_string(),
            }),
        }
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .read()
            .order_items
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl LedgerRepository for InMemoryTransaction {
    async fn append_stock_history(&mut self, entry: &StockHistory) -> Result<()> {
        self.write().stock_history.push(entry.clone());
        Ok(())
    }

    async fn append_price_history(&mut self, entry: &PriceHistory) -> Result<()> {
        self.write().price_history.push(entry.clone());
        Ok(())
    }

    async fn stock_history(&mut self, product_id: ProductId) -> Result<Vec<StockHistory>> {
        Ok(self
            .read()
            .stock_history
            .iter()
            .filter(|h| h.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn price_history(&mut self, product_id: ProductId) -> Result<Vec<PriceHistory>> {
        Ok(self
            .read()
            .price_history
            .iter()
            .filter(|h| h.product_id == product_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn commit(mut self) -> Result<()> {
        if self.take_injected_failure() {
            return Err(PersistenceError::TransactionAborted(
                "injected commit failure".to_string(),
            ));
        }
        if let Some(work) = self.work.take() {
            *self.guard = work;
        }
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::finish;

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let uow = InMemoryUnitOfWork::new();
        let store = Store::new("Main");

        let mut tx = uow.begin().await.unwrap();
        tx.insert_store(&store).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = uow.begin().await.unwrap();
        assert_eq!(tx.get_store(store.id).await.unwrap(), Some(store));
    }

    #[tokio::test]
    async fn test_drop_discards_writes() {
        let uow = InMemoryUnitOfWork::new();
        let store = Store::new("Main");

        {
            let mut tx = uow.begin().await.unwrap();
            tx.insert_store(&store).await.unwrap();
            assert!(tx.get_store(store.id).await.unwrap().is_some());
        }

        let mut tx = uow.begin().await.unwrap();
        assert!(tx.get_store(store.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finish_rolls_back_and_returns_error_unchanged() {
        let uow = InMemoryUnitOfWork::new();
        let store = Store::new("Main");

        let mut tx = uow.begin().await.unwrap();
        let result: std::result::Result<(), PersistenceError> = async {
            tx.insert_store(&store).await?;
            Err(PersistenceError::Corrupt("boom".to_string()))
        }
        .await;
        let err = finish(tx, result).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt(ref m) if m == "boom"));

        let mut tx = uow.begin().await.unwrap();
        assert!(tx.get_store(store.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_injected_commit_failure_discards_writes() {
        let uow = InMemoryUnitOfWork::new();
        uow.fail_next_commits(1);
        let store = Store::new("Main");

        let mut tx = uow.begin().await.unwrap();
        tx.insert_store(&store).await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, PersistenceError::TransactionAborted(_)));

        let mut tx = uow.begin().await.unwrap();
        assert!(tx.get_store(store.id).await.unwrap().is_none());
        tx.insert_store(&store).await.unwrap();
        tx.commit().await.unwrap();
    }
}
