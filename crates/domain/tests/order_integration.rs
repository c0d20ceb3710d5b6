//! Integration tests for platform order ingest and local status changes.
//!
//! These tests verify idempotent upsert, stock movements tied to orders, and
//! that a failing order leaves no partial state behind.

use common::Money;
use domain::{
    CatalogService, Category, DomainError, InMemoryUnitOfWork, IngestOutcome, IntegrationRegistry,
    NewIntegration, OrderService, OrderStatus, OrderStatusUpdate, PlatformIntegration, Product,
    RawOrder, RawOrderItem, StockChangeType, UnitOfWork,
    repository::{ListingRepository, Transaction},
};

struct Fixture {
    uow: InMemoryUnitOfWork,
    catalog: CatalogService<InMemoryUnitOfWork>,
    orders: OrderService<InMemoryUnitOfWork>,
    integration: PlatformIntegration,
    listed: Product,
    by_sku: Product,
}

async fn fixture() -> Fixture {
    let uow = InMemoryUnitOfWork::new();
    let catalog = CatalogService::new(uow.clone());
    let store = catalog.create_store("Main").await.unwrap();
    let category = catalog.create_category(Category::new("Kitchen")).await.unwrap();
    let listed = catalog
        .create_product(
            Product::new(store.id, category.id, "Mug", Money::from_cents(500)).with_stock(10, 5),
        )
        .await
        .unwrap();
    let by_sku = catalog
        .create_product(
            Product::new(store.id, category.id, "Plate", Money::from_cents(900))
                .with_sku("PLATE-1")
                .with_stock(4, 5),
        )
        .await
        .unwrap();
    let integration = IntegrationRegistry::new(uow.clone())
        .create(NewIntegration::new(store.id, "trendyol", "cred-1"))
        .await
        .unwrap();

    let mut listing = catalog
        .attach_listing(listed.id, integration.id, true)
        .await
        .unwrap();
    listing.platform_product_id = Some("TY-MUG".to_string());
    listing.is_listed = true;
    let mut tx = uow.begin().await.unwrap();
    tx.update_listing(&listing).await.unwrap();
    tx.commit().await.unwrap();

    Fixture {
        orders: OrderService::new(uow.clone()),
        uow,
        catalog,
        integration,
        listed,
        by_sku,
    }
}

fn raw_order(id: &str, status: OrderStatus) -> RawOrder {
    RawOrder::new(id, status)
        .with_item(RawOrderItem::new("Mug", 2, Money::from_cents(500)).with_platform_product_id("TY-MUG"))
        .with_item(RawOrderItem::new("Plate", 1, Money::from_cents(900)).with_sku("PLATE-1"))
        .with_item(RawOrderItem::new("Gift wrap", 1, Money::from_cents(100)))
}

mod ingest {
    use super::*;

    #[tokio::test]
    async fn new_order_decrements_linked_stock() {
        let f = fixture().await;

        let outcome = f
            .orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Inserted);

        assert_eq!(f.catalog.get_product(f.listed.id).await.unwrap().stock_quantity(), 8);
        assert_eq!(f.catalog.get_product(f.by_sku.id).await.unwrap().stock_quantity(), 3);

        let order = &f.orders.orders_by_integration(f.integration.id).await.unwrap()[0];
        assert_eq!(order.order_number, "TRENDYOL-1001");
        assert_eq!(order.total_amount, Money::from_cents(2000));

        let items = f.orders.order_items(order.id).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].product_id, Some(f.listed.id));
        assert_eq!(items[1].product_id, Some(f.by_sku.id));
        assert_eq!(items[2].product_id, None);

        let sale = f.catalog.stock_history(f.listed.id).await.unwrap();
        let sale = sale.last().unwrap();
        assert_eq!(sale.change_type, StockChangeType::Sale);
        assert_eq!(sale.order_id, Some(order.id));
        assert_eq!(sale.change_quantity, -2);
    }

    #[tokio::test]
    async fn pulling_the_same_order_twice_is_idempotent() {
        let f = fixture().await;
        let raw = raw_order("1001", OrderStatus::Pending);

        f.orders.ingest(&f.integration, &raw).await.unwrap();
        let order = f.orders.orders_by_integration(f.integration.id).await.unwrap()[0].clone();
        let items = f.orders.order_items(order.id).await.unwrap();

        let outcome = f.orders.ingest(&f.integration, &raw).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Unchanged);

        let orders = f.orders.orders_by_integration(f.integration.id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(f.orders.order_items(order.id).await.unwrap(), items);
        assert_eq!(f.catalog.get_product(f.listed.id).await.unwrap().stock_quantity(), 8);
    }

    #[tokio::test]
    async fn repull_applies_forward_status_and_header_changes() {
        let f = fixture().await;
        f.orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Pending))
            .await
            .unwrap();

        let mut shipped = raw_order("1001", OrderStatus::Shipped);
        shipped.cargo_company = Some("Aras".to_string());
        shipped.tracking_number = Some("TRK-9".to_string());
        let outcome = f.orders.ingest(&f.integration, &shipped).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Updated);

        let order = &f.orders.orders_by_integration(f.integration.id).await.unwrap()[0];
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.tracking_number.as_deref(), Some("TRK-9"));
        assert!(order.shipped_at.is_some());

        let backwards = raw_order("1001", OrderStatus::Processing);
        let outcome = f.orders.ingest(&f.integration, &backwards).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Unchanged);
        let order = &f.orders.orders_by_integration(f.integration.id).await.unwrap()[0];
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn remote_cancellation_restocks() {
        let f = fixture().await;
        f.orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Pending))
            .await
            .unwrap();
        f.orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Cancelled))
            .await
            .unwrap();

        assert_eq!(f.catalog.get_product(f.listed.id).await.unwrap().stock_quantity(), 10);
        let history = f.catalog.stock_history(f.by_sku.id).await.unwrap();
        assert_eq!(history.last().unwrap().change_type, StockChangeType::Return);
    }

    #[tokio::test]
    async fn order_arriving_cancelled_does_not_touch_stock() {
        let f = fixture().await;
        f.orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(f.catalog.get_product(f.listed.id).await.unwrap().stock_quantity(), 10);
    }

    #[tokio::test]
    async fn insufficient_stock_rejects_only_that_order() {
        let f = fixture().await;
        let greedy = RawOrder::new("1002", OrderStatus::Pending)
            .with_item(RawOrderItem::new("Mug", 1, Money::from_cents(500)).with_platform_product_id("TY-MUG"))
            .with_item(RawOrderItem::new("Plate", 5, Money::from_cents(900)).with_sku("PLATE-1"));

        let err = f.orders.ingest(&f.integration, &greedy).await.unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { .. }));

        assert!(f.orders.orders_by_integration(f.integration.id).await.unwrap().is_empty());
        assert_eq!(f.catalog.get_product(f.listed.id).await.unwrap().stock_quantity(), 10);

        f.orders
            .ingest(&f.integration, &raw_order("1003", OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(f.orders.orders_by_integration(f.integration.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overflowing_line_total_rejects_only_that_order() {
        let f = fixture().await;
        let malformed = RawOrder::new("1004", OrderStatus::Pending).with_item(
            RawOrderItem::new("Mug", 3, Money::from_cents(i64::MAX / 2))
                .with_platform_product_id("TY-MUG"),
        );

        let err = f.orders.ingest(&f.integration, &malformed).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidAmount(_)));
        assert!(f.orders.orders_by_integration(f.integration.id).await.unwrap().is_empty());
        assert_eq!(f.catalog.get_product(f.listed.id).await.unwrap().stock_quantity(), 10);

        f.orders
            .ingest(&f.integration, &raw_order("1005", OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(f.orders.orders_by_integration(f.integration.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commit_failure_leaves_no_order_behind() {
        let f = fixture().await;
        f.uow.fail_next_commits(1);

        let err = f
            .orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
        assert!(f.orders.orders_by_integration(f.integration.id).await.unwrap().is_empty());
        assert_eq!(f.catalog.stock_history(f.listed.id).await.unwrap().len(), 1);
    }
}

mod local_status {
    use super::*;

    #[tokio::test]
    async fn delivery_stamps_dates() {
        let f = fixture().await;
        f.orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Processing))
            .await
            .unwrap();
        let order_id = f.orders.orders_by_integration(f.integration.id).await.unwrap()[0].id;

        let order = f
            .orders
            .update_status(OrderStatusUpdate::new(order_id, OrderStatus::Shipped).with_tracking("Yurtici", "YK-1"))
            .await
            .unwrap();
        assert_eq!(order.cargo_company.as_deref(), Some("Yurtici"));

        let order = f
            .orders
            .update_status(OrderStatusUpdate::new(order_id, OrderStatus::Delivered))
            .await
            .unwrap();
        assert!(order.delivered_at.is_some());
        assert!(order.shipped_at.unwrap() <= order.delivered_at.unwrap());
        assert_eq!(f.orders.orders_by_status(OrderStatus::Delivered).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let f = fixture().await;
        f.orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Delivered))
            .await
            .unwrap();
        let order_id = f.orders.orders_by_integration(f.integration.id).await.unwrap()[0].id;

        let err = f
            .orders
            .update_status(OrderStatusUpdate::new(order_id, OrderStatus::Returned))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Returned
            }
        ));
    }

    #[tokio::test]
    async fn local_return_restocks_in_one_transaction() {
        let f = fixture().await;
        f.orders
            .ingest(&f.integration, &raw_order("1001", OrderStatus::Shipped))
            .await
            .unwrap();
        let order_id = f.orders.orders_by_integration(f.integration.id).await.unwrap()[0].id;

        f.orders
            .update_status(OrderStatusUpdate::new(order_id, OrderStatus::Returned))
            .await
            .unwrap();

        assert_eq!(f.catalog.get_product(f.listed.id).await.unwrap().stock_quantity(), 10);
        assert_eq!(f.catalog.get_product(f.by_sku.id).await.unwrap().stock_quantity(), 4);
        let history = f.catalog.stock_history(f.listed.id).await.unwrap();
        assert_eq!(
            history.iter().map(|h| h.change_type).collect::<Vec<_>>(),
            vec![StockChangeType::Restock, StockChangeType::Sale, StockChangeType::Return]
        );
    }
}
