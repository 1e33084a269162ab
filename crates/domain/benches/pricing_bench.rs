use common::{ClientId, Money, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    InMemoryPaymentSessions, InMemoryProductCatalog, OrderService, RequestedItem, ValidatedProduct,
    price_order,
};
use order_store::InMemoryOrderRepository;

fn catalog_of(size: i64) -> Vec<ValidatedProduct> {
    (1..=size)
        .map(|i| ValidatedProduct {
            id: ProductId::new(i),
            price: Money::from_cents(100 * i),
            name: format!("product-{i}"),
        })
        .collect()
}

fn request_of(size: i64) -> Vec<RequestedItem> {
    (1..=size)
        .map(|i| RequestedItem {
            product_id: ProductId::new(i),
            quantity: (i % 5) as u32 + 1,
        })
        .collect()
}

fn bench_price_order_small(c: &mut Criterion) {
    let catalog = catalog_of(5);
    let requested = request_of(5);

    c.bench_function("pricing/price_order_5", |b| {
        b.iter(|| price_order(&requested, &catalog).unwrap());
    });
}

fn bench_price_order_large(c: &mut Criterion) {
    let catalog = catalog_of(200);
    let requested = request_of(200);

    c.bench_function("pricing/price_order_200", |b| {
        b.iter(|| price_order(&requested, &catalog).unwrap());
    });
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let repo = InMemoryOrderRepository::new();
    let catalog = InMemoryProductCatalog::new();
    for product in catalog_of(5) {
        catalog.insert(product.id, product.price, product.name);
    }
    let service = OrderService::new(repo, catalog, InMemoryPaymentSessions::new());

    c.bench_function("service/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .create_order(UserId::new(1), ClientId::new(1), request_of(5))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_price_order_small,
    bench_price_order_large,
    bench_create_order
);
criterion_main!(benches);
