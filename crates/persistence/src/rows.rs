//! Row decoding.

use std::str::FromStr;

use common::{
    CategoryId, HistoryId, IntegrationId, ListingId, Money, OrderId, OrderItemId, ProductId,
    StoreId,
};
use domain::{
    Category, Order, OrderItem, PersistenceError, PlatformIntegration, PlatformType, PriceHistory,
    Product, ProductPlatform, StockHistory, Store,
};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::db;

type Result<T> = std::result::Result<T, PersistenceError>;

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(db)
}

fn uuid(row: &PgRow, column: &str) -> Result<Uuid> {
    get(row, column)
}

fn opt_uuid(row: &PgRow, column: &str) -> Result<Option<Uuid>> {
    get(row, column)
}

fn quantity(row: &PgRow, column: &str) -> Result<u32> {
    let value: i64 = get(row, column)?;
    u32::try_from(value)
        .map_err(|_| PersistenceError::Corrupt(format!("{column} out of range: {value}")))
}

fn money(row: &PgRow, column: &str) -> Result<Money> {
    Ok(Money::from_cents(get(row, column)?))
}

fn opt_money(row: &PgRow, column: &str) -> Result<Option<Money>> {
    Ok(get::<Option<i64>>(row, column)?.map(Money::from_cents))
}

fn parsed<T: FromStr<Err = String>>(row: &PgRow, column: &str) -> Result<T> {
    let raw: String = get(row, column)?;
    raw.parse().map_err(PersistenceError::Corrupt)
}

pub(crate) fn store(row: &PgRow) -> Result<Store> {
    Ok(Store {
        id: StoreId::from_uuid(uuid(row, "id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
        is_active: get(row, "is_active")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn category(row: &PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::from_uuid(uuid(row, "id")?),
        name: get(row, "name")?,
        parent_id: opt_uuid(row, "parent_id")?.map(CategoryId::from_uuid),
        display_order: get(row, "display_order")?,
        is_active: get(row, "is_active")?,
    })
}

pub(crate) fn product(row: &PgRow) -> Result<Product> {
    let mut product = Product::new(
        StoreId::from_uuid(uuid(row, "store_id")?),
        CategoryId::from_uuid(uuid(row, "category_id")?),
        get::<String>(row, "name")?,
        money(row, "base_price_cents")?,
    )
    .with_stock(
        quantity(row, "stock_quantity")?,
        quantity(row, "min_stock_level")?,
    );
    product.id = ProductId::from_uuid(uuid(row, "id")?);
    product.sku = get(row, "sku")?;
    product.barcode = get(row, "barcode")?;
    product.description = get(row, "description")?;
    product.cost_price = opt_money(row, "cost_price_cents")?;
    product.price_strategy = parsed(row, "price_strategy")?;
    product.is_active = get(row, "is_active")?;
    product.created_at = get(row, "created_at")?;
    product.updated_at = get(row, "updated_at")?;
    Ok(product)
}

pub(crate) fn listing(row: &PgRow) -> Result<ProductPlatform> {
    Ok(ProductPlatform {
        id: ListingId::from_uuid(uuid(row, "id")?),
        product_id: ProductId::from_uuid(uuid(row, "product_id")?),
        integration_id: IntegrationId::from_uuid(uuid(row, "integration_id")?),
        platform_product_id: get(row, "platform_product_id")?,
        platform_price: money(row, "platform_price_cents")?,
        platform_stock_quantity: quantity(row, "platform_stock_quantity")?,
        is_listed: get(row, "is_listed")?,
        auto_sync: get(row, "auto_sync")?,
        last_sync_date: get(row, "last_sync_date")?,
    })
}

pub(crate) fn integration(row: &PgRow) -> Result<PlatformIntegration> {
    let interval: Option<i32> = get(row, "sync_interval_minutes")?;
    Ok(PlatformIntegration {
        id: IntegrationId::from_uuid(uuid(row, "id")?),
        store_id: StoreId::from_uuid(uuid(row, "store_id")?),
        platform_type: PlatformType::new(get::<String>(row, "platform_type")?),
        platform_store_name: get(row, "platform_store_name")?,
        credentials_ref: get(row, "credentials_ref")?,
        is_active: get(row, "is_active")?,
        last_sync_date: get(row, "last_sync_date")?,
        last_sync_status: parsed(row, "last_sync_status")?,
        sync_started_at: get(row, "sync_started_at")?,
        sync_interval_minutes: interval.map(|m| m.max(0) as u32),
        orders_synced_through: get(row, "orders_synced_through")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn order(row: &PgRow) -> Result<Order> {
    Ok(Order {
        id: OrderId::from_uuid(uuid(row, "id")?),
        store_id: StoreId::from_uuid(uuid(row, "store_id")?),
        integration_id: IntegrationId::from_uuid(uuid(row, "integration_id")?),
        platform_order_id: get(row, "platform_order_id")?,
        order_number: get(row, "order_number")?,
        status: parsed(row, "status")?,
        total_amount: money(row, "total_amount_cents")?,
        shipping_amount: opt_money(row, "shipping_amount_cents")?,
        discount_amount: opt_money(row, "discount_amount_cents")?,
        tax_amount: opt_money(row, "tax_amount_cents")?,
        customer_name: get(row, "customer_name")?,
        customer_email: get(row, "customer_email")?,
        customer_phone: get(row, "customer_phone")?,
        shipping_address: get(row, "shipping_address")?,
        billing_address: get(row, "billing_address")?,
        cargo_company: get(row, "cargo_company")?,
        tracking_number: get(row, "tracking_number")?,
        order_date: get(row, "order_date")?,
        shipped_at: get(row, "shipped_at")?,
        delivered_at: get(row, "delivered_at")?,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn order_item(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        id: OrderItemId::from_uuid(uuid(row, "id")?),
        order_id: OrderId::from_uuid(uuid(row, "order_id")?),
        product_id: opt_uuid(row, "product_id")?.map(ProductId::from_uuid),
        product_name: get(row, "product_name")?,
        sku: get(row, "sku")?,
        platform_product_id: get(row, "platform_product_id")?,
        quantity: quantity(row, "quantity")?,
        unit_price: money(row, "unit_price_cents")?,
        discount_amount: opt_money(row, "discount_amount_cents")?,
        total_price: money(row, "total_price_cents")?,
    })
}

pub(crate) fn stock_history(row: &PgRow) -> Result<StockHistory> {
    Ok(StockHistory {
        id: HistoryId::from_uuid(uuid(row, "id")?),
        product_id: ProductId::from_uuid(uuid(row, "product_id")?),
        integration_id: opt_uuid(row, "integration_id")?.map(IntegrationId::from_uuid),
        previous_quantity: quantity(row, "previous_quantity")?,
        new_quantity: quantity(row, "new_quantity")?,
        change_quantity: get(row, "change_quantity")?,
        change_type: parsed(row, "change_type")?,
        reason: get(row, "reason")?,
        order_id: opt_uuid(row, "order_id")?.map(OrderId::from_uuid),
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn price_history(row: &PgRow) -> Result<PriceHistory> {
    Ok(PriceHistory {
        id: HistoryId::from_uuid(uuid(row, "id")?),
        product_id: ProductId::from_uuid(uuid(row, "product_id")?),
        integration_id: opt_uuid(row, "integration_id")?.map(IntegrationId::from_uuid),
        previous_price: money(row, "previous_price_cents")?,
        new_price: money(row, "new_price_cents")?,
        change_type: parsed(row, "change_type")?,
        reason: get(row, "reason")?,
        created_at: get(row, "created_at")?,
    })
}
