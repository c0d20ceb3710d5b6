//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need Docker.
//! Run with:
//!
//! ```bash
//! cargo test -p persistence --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use common::Money;
use domain::repository::{IntegrationRepository, ListingRepository, OrderRepository};
use domain::{
    CatalogService, Category, DomainError, IntegrationRegistry, NewIntegration, OrderService,
    OrderStatus, PersistenceError, PriceChangeType, Product, RawOrder, RawOrderItem, StockChange,
    StockChangeType, StockStatus, UnitOfWork, finish,
};
use persistence::PgUnitOfWork;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_commerce_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh unit of work with its own pool and cleared tables
async fn get_test_uow() -> PgUnitOfWork {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE stock_history, price_history, order_items, orders, product_platforms, \
         integrations, products, categories, stores CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    PgUnitOfWork::new(pool)
}

async fn seed(uow: &PgUnitOfWork, stock: u32) -> (Product, domain::PlatformIntegration) {
    let catalog = CatalogService::new(uow.clone());
    let store = catalog.create_store("Main").await.unwrap();
    let category = catalog.create_category(Category::new("Toys")).await.unwrap();
    let product = catalog
        .create_product(
            Product::new(store.id, category.id, "Widget", Money::from_cents(1500))
                .with_sku("W-1")
                .with_stock(stock, 5),
        )
        .await
        .unwrap();
    let integration = IntegrationRegistry::new(uow.clone())
        .create(NewIntegration::new(store.id, "trendyol", "cred-1"))
        .await
        .unwrap();
    (product, integration)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn stock_change_round_trips_with_its_ledger_row() {
    let uow = get_test_uow().await;
    let (product, _) = seed(&uow, 3).await;
    let catalog = CatalogService::new(uow.clone());

    let updated = catalog
        .apply_stock_change(StockChange::new(product.id, -3, StockChangeType::Sale))
        .await
        .unwrap();
    assert_eq!(updated.stock_status(), StockStatus::OutOfStock);

    let reloaded = catalog.get_product(product.id).await.unwrap();
    assert_eq!(reloaded.stock_quantity(), 0);
    assert_eq!(reloaded.sku.as_deref(), Some("W-1"));

    let history = catalog.stock_history(product.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].previous_quantity, 3);
    assert_eq!(history[1].new_quantity, 0);
    assert_eq!(history[1].change_type, StockChangeType::Sale);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn rollback_discards_product_and_ledger_writes() {
    let uow = get_test_uow().await;
    let (product, _) = seed(&uow, 10).await;

    let mut tx = uow.begin().await.unwrap();
    let result: Result<(), DomainError> = async {
        domain::catalog::apply_stock_change(
            &mut tx,
            &StockChange::new(product.id, -4, StockChangeType::Sale),
        )
        .await?;
        Err(DomainError::Conflict("forced".to_string()))
    }
    .await;
    assert!(finish(tx, result).await.is_err());

    let catalog = CatalogService::new(uow.clone());
    assert_eq!(catalog.get_product(product.id).await.unwrap().stock_quantity(), 10);
    assert_eq!(catalog.stock_history(product.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn product_with_ledger_rows_cannot_be_deleted() {
    let uow = get_test_uow().await;
    let (product, _) = seed(&uow, 2).await;
    let catalog = CatalogService::new(uow.clone());
    catalog
        .update_price(product.id, Money::from_cents(1800), PriceChangeType::Manual, None)
        .await
        .unwrap();

    let err = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product.id.as_uuid())
        .execute(uow.pool())
        .await
        .unwrap_err();
    let code = err.as_database_error().and_then(|e| e.code()).unwrap();
    assert_eq!(code, "23503");

    assert_eq!(catalog.stock_history(product.id).await.unwrap().len(), 1);
    assert_eq!(catalog.price_history(product.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn one_active_integration_per_platform() {
    let uow = get_test_uow().await;
    let (product, integration) = seed(&uow, 1).await;
    let registry = IntegrationRegistry::new(uow.clone());

    let err = registry
        .create(NewIntegration::new(product.store_id, "TRENDYOL", "cred-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    registry.deactivate(integration.id).await.unwrap();
    registry
        .create(NewIntegration::new(product.store_id, "TRENDYOL", "cred-2"))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn duplicate_listing_and_restricted_delete_conflict() {
    let uow = get_test_uow().await;
    let (product, integration) = seed(&uow, 1).await;
    let catalog = CatalogService::new(uow.clone());

    let listing = catalog
        .attach_listing(product.id, integration.id, true)
        .await
        .unwrap();
    let err = catalog
        .attach_listing(product.id, integration.id, true)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Conflict(_)));

    let mut tx = uow.begin().await.unwrap();
    let err = tx.delete_integration(integration.id).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Conflict { .. }));
    drop(tx);

    let mut tx = uow.begin().await.unwrap();
    let found = tx.listed(integration.id).await.unwrap();
    assert!(found.is_empty());
    let all = tx.listings_by_integration(integration.id).await.unwrap();
    assert_eq!(all, vec![listing]);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn order_upsert_is_idempotent() {
    let uow = get_test_uow().await;
    let (product, integration) = seed(&uow, 10).await;
    let orders = OrderService::new(uow.clone());

    let raw = RawOrder::new("5001", OrderStatus::Pending)
        .with_item(RawOrderItem::new("Widget", 2, Money::from_cents(1500)).with_sku("W-1"));
    orders.ingest(&integration, &raw).await.unwrap();
    orders.ingest(&integration, &raw).await.unwrap();

    let mut tx = uow.begin().await.unwrap();
    let stored = tx.orders_by_integration(integration.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    let items = tx.order_items(stored[0].id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, Some(product.id));
    assert_eq!(
        tx.get_integration(integration.id).await.unwrap().unwrap().platform_type.as_str(),
        "TRENDYOL"
    );
    drop(tx);

    let catalog = CatalogService::new(uow.clone());
    assert_eq!(catalog.get_product(product.id).await.unwrap().stock_quantity(), 8);
}
