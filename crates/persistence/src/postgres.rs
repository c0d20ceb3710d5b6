use async_trait::async_trait;
use common::{CategoryId, IntegrationId, OrderId, ProductId, StoreId};
use domain::repository::{
    IntegrationRepository, LedgerRepository, ListingRepository, OrderRepository,
    ProductRepository, StoreRepository,
};
use domain::{
    Category, Order, OrderItem, OrderStatus, PersistenceError, PlatformIntegration, PlatformType,
    PriceHistory, Product, ProductPlatform, StockHistory, Store, Transaction, UnitOfWork,
};
use sqlx::{PgPool, Postgres};

use crate::error::{db, not_found};
use crate::rows;

type Result<T> = std::result::Result<T, PersistenceError>;

const PRODUCT_COLUMNS: &str = "id, store_id, category_id, name, sku, barcode, description, \
     base_price_cents, cost_price_cents, stock_quantity, min_stock_level, price_strategy, \
     is_active, created_at, updated_at";

const LISTING_COLUMNS: &str = "id, product_id, integration_id, platform_product_id, \
     platform_price_cents, platform_stock_quantity, is_listed, auto_sync, last_sync_date";

const INTEGRATION_COLUMNS: &str = "id, store_id, platform_type, platform_store_name, \
     credentials_ref, is_active, last_sync_date, last_sync_status, sync_started_at, \
     sync_interval_minutes, orders_synced_through, created_at";

const ORDER_COLUMNS: &str = "id, store_id, integration_id, platform_order_id, order_number, \
     status, total_amount_cents, shipping_amount_cents, discount_amount_cents, tax_amount_cents, \
     customer_name, customer_email, customer_phone, shipping_address, billing_address, \
     cargo_company, tracking_number, order_date, shipped_at, delivered_at, notes, created_at, \
     updated_at";

/// PostgreSQL-backed unit of work.
#[derive(Clone)]
pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    /// Creates a new unit of work over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction> {
        let tx = self.pool.begin().await.map_err(db)?;
        Ok(PgTransaction { tx })
    }
}

/// One database transaction. Dropping it without committing rolls back.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn cents(value: Option<common::Money>) -> Option<i64> {
    value.map(|m| m.cents())
}

#[async_trait]
impl StoreRepository for PgTransaction {
    async fn get_store(&mut self, id: StoreId) -> Result<Option<Store>> {
        let row = sqlx::query(
            "SELECT id, name, description, is_active, created_at FROM stores WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::store).transpose()
    }

    async fn insert_store(&mut self, store: &Store) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stores (id, name, description, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(store.id.as_uuid())
        .bind(&store.name)
        .bind(&store.description)
        .bind(store.is_active)
        .bind(store.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn get_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(
            "SELECT id, name, parent_id, display_order, is_active FROM categories WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::category).transpose()
    }

    async fn insert_category(&mut self, category: &Category) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO categories (id, name, parent_id, display_order, is_active)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(category.id.as_uuid())
        .bind(&category.name)
        .bind(category.parent_id.map(|p| p.as_uuid()))
        .bind(category.display_order)
        .bind(category.is_active)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PgTransaction {
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;
        row.as_ref().map(rows::product).transpose()
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::product).transpose()
    }

    async fn products_by_store(&mut self, store_id: StoreId) -> Result<Vec<Product>> {
        let found = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = $1 ORDER BY name, id"
        ))
        .bind(store_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::product).collect()
    }

    async fn find_product_by_sku(
        &mut self,
        store_id: StoreId,
        sku: &str,
    ) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE store_id = $1 AND sku = $2 LIMIT 1"
        ))
        .bind(store_id.as_uuid())
        .bind(sku)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::product).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, store_id, category_id, name, sku, barcode, description,
                base_price_cents, cost_price_cents, stock_quantity, min_stock_level, stock_status,
                price_strategy, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.store_id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.description)
        .bind(product.base_price.cents())
        .bind(cents(product.cost_price))
        .bind(product.stock_quantity() as i64)
        .bind(product.min_stock_level() as i64)
        .bind(product.stock_status().as_str())
        .bind(product.price_strategy.as_str())
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                category_id = $2, name = $3, sku = $4, barcode = $5, description = $6,
                base_price_cents = $7, cost_price_cents = $8, stock_quantity = $9,
                min_stock_level = $10, stock_status = $11, price_strategy = $12,
                is_active = $13, updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.category_id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.description)
        .bind(product.base_price.cents())
        .bind(cents(product.cost_price))
        .bind(product.stock_quantity() as i64)
        .bind(product.min_stock_level() as i64)
        .bind(product.stock_status().as_str())
        .bind(product.price_strategy.as_str())
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("product", product.id));
        }
        Ok(())
    }
}

#[async_trait]
impl ListingRepository for PgTransaction {
    async fn get_listing(
        &mut self,
        product_id: ProductId,
        integration_id: IntegrationId,
    ) -> Result<Option<ProductPlatform>> {
        let row = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM product_platforms \
             WHERE product_id = $1 AND integration_id = $2"
        ))
        .bind(product_id.as_uuid())
        .bind(integration_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::listing).transpose()
    }

    async fn listings_by_integration(
        &mut self,
        integration_id: IntegrationId,
    ) -> Result<Vec<ProductPlatform>> {
        let found = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM product_platforms WHERE integration_id = $1 ORDER BY id"
        ))
        .bind(integration_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::listing).collect()
    }

    async fn listed(&mut self, integration_id: IntegrationId) -> Result<Vec<ProductPlatform>> {
        let found = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM product_platforms \
             WHERE integration_id = $1 AND is_listed ORDER BY id"
        ))
        .bind(integration_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::listing).collect()
    }

    async fn find_listing_by_platform_product(
        &mut self,
        integration_id: IntegrationId,
        platform_product_id: &str,
    ) -> Result<Option<ProductPlatform>> {
        let row = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM product_platforms \
             WHERE integration_id = $1 AND platform_product_id = $2 LIMIT 1"
        ))
        .bind(integration_id.as_uuid())
        .bind(platform_product_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::listing).transpose()
    }

    async fn insert_listing(&mut self, listing: &ProductPlatform) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_platforms (id, product_id, integration_id, platform_product_id,
                platform_price_cents, platform_stock_quantity, is_listed, auto_sync, last_sync_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(listing.id.as_uuid())
        .bind(listing.product_id.as_uuid())
        .bind(listing.integration_id.as_uuid())
        .bind(&listing.platform_product_id)
        .bind(listing.platform_price.cents())
        .bind(listing.platform_stock_quantity as i64)
        .bind(listing.is_listed)
        .bind(listing.auto_sync)
        .bind(listing.last_sync_date)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_listing(&mut self, listing: &ProductPlatform) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE product_platforms SET
                platform_product_id = $2, platform_price_cents = $3,
                platform_stock_quantity = $4, is_listed = $5, auto_sync = $6,
                last_sync_date = $7
            WHERE id = $1
            "#,
        )
        .bind(listing.id.as_uuid())
        .bind(&listing.platform_product_id)
        .bind(listing.platform_price.cents())
        .bind(listing.platform_stock_quantity as i64)
        .bind(listing.is_listed)
        .bind(listing.auto_sync)
        .bind(listing.last_sync_date)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("listing", listing.id));
        }
        Ok(())
    }
}

#[async_trait]
impl IntegrationRepository for PgTransaction {
    async fn get_integration(
        &mut self,
        id: IntegrationId,
    ) -> Result<Option<PlatformIntegration>> {
        let row = sqlx::query(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::integration).transpose()
    }

    async fn lock_integration(
        &mut self,
        id: IntegrationId,
    ) -> Result<Option<PlatformIntegration>> {
        let row = sqlx::query(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::integration).transpose()
    }

    async fn integrations_by_store(
        &mut self,
        store_id: StoreId,
    ) -> Result<Vec<PlatformIntegration>> {
        let found = sqlx::query(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE store_id = $1 ORDER BY created_at"
        ))
        .bind(store_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::integration).collect()
    }

    async fn active_integrations(&mut self) -> Result<Vec<PlatformIntegration>> {
        let found = sqlx::query(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE is_active ORDER BY created_at"
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::integration).collect()
    }

    async fn find_active_integration(
        &mut self,
        store_id: StoreId,
        platform_type: &PlatformType,
    ) -> Result<Option<PlatformIntegration>> {
        let row = sqlx::query(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations \
             WHERE store_id = $1 AND platform_type = $2 AND is_active"
        ))
        .bind(store_id.as_uuid())
        .bind(platform_type.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::integration).transpose()
    }

    async fn insert_integration(&mut self, integration: &PlatformIntegration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO integrations (id, store_id, platform_type, platform_store_name,
                credentials_ref, is_active, last_sync_date, last_sync_status, sync_started_at,
                sync_interval_minutes, orders_synced_through, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(integration.id.as_uuid())
        .bind(integration.store_id.as_uuid())
        .bind(integration.platform_type.as_str())
        .bind(&integration.platform_store_name)
        .bind(&integration.credentials_ref)
        .bind(integration.is_active)
        .bind(integration.last_sync_date)
        .bind(integration.last_sync_status.as_str())
        .bind(integration.sync_started_at)
        .bind(integration.sync_interval_minutes.map(|m| m as i32))
        .bind(integration.orders_synced_through)
        .bind(integration.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_integration(&mut self, integration: &PlatformIntegration) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE integrations SET
                platform_store_name = $2, credentials_ref = $3, is_active = $4,
                last_sync_date = $5, last_sync_status = $6, sync_started_at = $7,
                sync_interval_minutes = $8, orders_synced_through = $9
            WHERE id = $1
            "#,
        )
        .bind(integration.id.as_uuid())
        .bind(&integration.platform_store_name)
        .bind(&integration.credentials_ref)
        .bind(integration.is_active)
        .bind(integration.last_sync_date)
        .bind(integration.last_sync_status.as_str())
        .bind(integration.sync_started_at)
        .bind(integration.sync_interval_minutes.map(|m| m as i32))
        .bind(integration.orders_synced_through)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("integration", integration.id));
        }
        Ok(())
    }

    async fn delete_integration(&mut self, id: IntegrationId) -> Result<()> {
        let result = sqlx::query("DELETE FROM integrations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("integration", id));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgTransaction {
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;
        row.as_ref().map(rows::order).transpose()
    }

    async fn find_order_by_platform_id(
        &mut self,
        integration_id: IntegrationId,
        platform_order_id: &str,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE integration_id = $1 AND platform_order_id = $2"
        ))
        .bind(integration_id.as_uuid())
        .bind(platform_order_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;
        row.as_ref().map(rows::order).transpose()
    }

    async fn orders_by_integration(
        &mut self,
        integration_id: IntegrationId,
    ) -> Result<Vec<Order>> {
        let found = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE integration_id = $1 ORDER BY order_number"
        ))
        .bind(integration_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::order).collect()
    }

    async fn orders_by_status(&mut self, status: OrderStatus) -> Result<Vec<Order>> {
        let found = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY order_number"
        ))
        .bind(status.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::order).collect()
    }

    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, store_id, integration_id, platform_order_id, order_number,
                status, total_amount_cents, shipping_amount_cents, discount_amount_cents,
                tax_amount_cents, customer_name, customer_email, customer_phone,
                shipping_address, billing_address, cargo_company, tracking_number, order_date,
                shipped_at, delivered_at, notes, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.store_id.as_uuid())
        .bind(order.integration_id.as_uuid())
        .bind(&order.platform_order_id)
        .bind(&order.order_number)
        .bind(order.status.as_str())
        .bind(order.total_amount.cents())
        .bind(cents(order.shipping_amount))
        .bind(cents(order.discount_amount))
        .bind(cents(order.tax_amount))
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(&order.cargo_company)
        .bind(&order.tracking_number)
        .bind(order.order_date)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        for (line_no, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, line_no, product_id, product_name, sku,
                    platform_product_id, quantity, unit_price_cents, discount_amount_cents,
                    total_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(order.id.as_uuid())
            .bind(line_no as i32)
            .bind(item.product_id.map(|p| p.as_uuid()))
            .bind(&item.product_name)
            .bind(&item.sku)
            .bind(&item.platform_product_id)
            .bind(item.quantity as i64)
            .bind(item.unit_price.cents())
            .bind(cents(item.discount_amount))
            .bind(item.total_price.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        }
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = $2, customer_name = $3, customer_email = $4, customer_phone = $5,
                shipping_address = $6, billing_address = $7, cargo_company = $8,
                tracking_number = $9, shipped_at = $10, delivered_at = $11, notes = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(&order.cargo_company)
        .bind(&order.tracking_number)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(&order.notes)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        if result.rows_affected() == 0 {
            return Err(not_found("order", order.id));
        }
        Ok(())
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let found = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, sku, platform_product_id, quantity,
                unit_price_cents, discount_amount_cents, total_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::order_item).collect()
    }
}

#[async_trait]
impl LedgerRepository for PgTransaction {
    async fn append_stock_history(&mut self, entry: &StockHistory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_history (id, product_id, integration_id, previous_quantity,
                new_quantity, change_quantity, change_type, reason, order_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.product_id.as_uuid())
        .bind(entry.integration_id.map(|i| i.as_uuid()))
        .bind(entry.previous_quantity as i64)
        .bind(entry.new_quantity as i64)
        .bind(entry.change_quantity)
        .bind(entry.change_type.as_str())
        .bind(&entry.reason)
        .bind(entry.order_id.map(|o| o.as_uuid()))
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn append_price_history(&mut self, entry: &PriceHistory) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (id, product_id, integration_id, previous_price_cents,
                new_price_cents, change_type, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.product_id.as_uuid())
        .bind(entry.integration_id.map(|i| i.as_uuid()))
        .bind(entry.previous_price.cents())
        .bind(entry.new_price.cents())
        .bind(entry.change_type.as_str())
        .bind(&entry.reason)
        .bind(entry.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn stock_history(&mut self, product_id: ProductId) -> Result<Vec<StockHistory>> {
        let found = sqlx::query(
            r#"
            SELECT id, product_id, integration_id, previous_quantity, new_quantity,
                change_quantity, change_type, reason, order_id, created_at
            FROM stock_history
            WHERE product_id = $1
            ORDER BY seq
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::stock_history).collect()
    }

    async fn price_history(&mut self, product_id: ProductId) -> Result<Vec<PriceHistory>> {
        let found = sqlx::query(
            r#"
            SELECT id, product_id, integration_id, previous_price_cents, new_price_cents,
                change_type, reason, created_at
            FROM price_history
            WHERE product_id = $1
            ORDER BY seq
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        found.iter().map(rows::price_history).collect()
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(db)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(db)
    }
}
