use common::Money;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CatalogService, Category, InMemoryUnitOfWork, PriceChangeType, Product, StockChange,
    StockChangeType,
};

fn seeded(rt: &tokio::runtime::Runtime) -> (CatalogService<InMemoryUnitOfWork>, common::ProductId) {
    rt.block_on(async {
        let service = CatalogService::new(InMemoryUnitOfWork::new());
        let store = service.create_store("Bench").await.unwrap();
        let category = service.create_category(Category::new("Bench")).await.unwrap();
        let product = service
            .create_product(
                Product::new(store.id, category.id, "Widget", Money::from_cents(1000))
                    .with_stock(1_000_000, 5),
            )
            .await
            .unwrap();
        (service, product.id)
    })
}

fn bench_stock_change(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, product_id) = seeded(&rt);

    c.bench_function("catalog/apply_stock_change", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .apply_stock_change(StockChange::new(product_id, -1, StockChangeType::Sale))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_price_change(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (service, product_id) = seeded(&rt);
    let mut cents = 1000;

    c.bench_function("catalog/update_price", |b| {
        b.iter(|| {
            cents += 1;
            rt.block_on(async {
                service
                    .update_price(
                        product_id,
                        Money::from_cents(cents),
                        PriceChangeType::Automatic,
                        None,
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_stock_change, bench_price_change);
criterion_main!(benches);
