//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use common::{BatchRef, Sku, Version};
use domain::{Batch, OrderLine, Product};
use sqlx::PgPool;
use store::{PostgresProductStore, ProductStore, StagedProduct, StoreError};
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
                "../../../migrations/001_create_allocation_tables.sql"
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresProductStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE allocations, batches, products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresProductStore::new(pool)
}

fn eta() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

fn lamp() -> Product {
    Product::new(
        "LAMP",
        vec![
            Batch::new("in-stock", "LAMP", 20, None),
            Batch::new("shipment", "LAMP", 50, Some(eta())),
        ],
    )
}

#[tokio::test]
#[ignore = "requires docker"]
async fn save_and_load_round_trips_batches_and_allocations() {
    let store = get_test_store().await;
    let mut product = lamp();
    product.allocate(OrderLine::new("o1", "LAMP", 5)).unwrap();

    store
        .save(vec![StagedProduct::new_product(product)])
        .await
        .unwrap();

    let loaded = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
    assert_eq!(loaded.version_number(), Version::new(1));
    assert_eq!(loaded.batches().len(), 2);

    let in_stock = loaded.batch(&BatchRef::new("in-stock")).unwrap();
    assert_eq!(in_stock.available_quantity(), 15);
    assert!(in_stock.is_allocated(&OrderLine::new("o1", "LAMP", 5)));

    let shipment = loaded.batch(&BatchRef::new("shipment")).unwrap();
    assert_eq!(shipment.eta(), Some(eta()));
    assert_eq!(shipment.available_quantity(), 50);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn load_unknown_sku_returns_none() {
    let store = get_test_store().await;

    assert!(store.load(&Sku::new("MISSING")).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_writers_one_wins() {
    let store = get_test_store().await;
    store
        .save(vec![StagedProduct::new_product(lamp())])
        .await
        .unwrap();

    let sku = Sku::new("LAMP");
    let mut first = StagedProduct::loaded(store.load(&sku).await.unwrap().unwrap());
    let mut second = StagedProduct::loaded(store.load(&sku).await.unwrap().unwrap());
    first
        .product
        .allocate(OrderLine::new("o1", "LAMP", 10))
        .unwrap();
    second
        .product
        .allocate(OrderLine::new("o2", "LAMP", 10))
        .unwrap();

    store.save(vec![first]).await.unwrap();
    let result = store.save(vec![second]).await;

    assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
    let stored = store.load(&sku).await.unwrap().unwrap();
    let lines: Vec<_> = stored
        .batches()
        .iter()
        .flat_map(|b| b.allocations())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].order_id.as_str(), "o1");
}

#[tokio::test]
#[ignore = "requires docker"]
async fn duplicate_new_product_conflicts() {
    let store = get_test_store().await;
    store
        .save(vec![StagedProduct::new_product(lamp())])
        .await
        .unwrap();

    let result = store.save(vec![StagedProduct::new_product(lamp())]).await;

    assert!(result.unwrap_err().is_conflict());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn quantity_change_persists_deallocations() {
    let store = get_test_store().await;
    let mut product = lamp();
    product.allocate(OrderLine::new("o1", "LAMP", 10)).unwrap();
    product.allocate(OrderLine::new("o2", "LAMP", 10)).unwrap();
    store
        .save(vec![StagedProduct::new_product(product)])
        .await
        .unwrap();

    let sku = Sku::new("LAMP");
    let mut staged = StagedProduct::loaded(store.load(&sku).await.unwrap().unwrap());
    staged
        .product
        .change_batch_quantity(&BatchRef::new("in-stock"), &sku, 10)
        .unwrap();
    store.save(vec![staged]).await.unwrap();

    let stored = store.load(&sku).await.unwrap().unwrap();
    let in_stock = stored.batch(&BatchRef::new("in-stock")).unwrap();
    assert_eq!(in_stock.purchased_quantity(), 10);
    assert_eq!(in_stock.available_quantity(), 0);
    assert_eq!(stored.version_number(), Version::new(3));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn batch_reference_is_scoped_to_its_product() {
    let store = get_test_store().await;
    let mut lamp = lamp();
    lamp.allocate(OrderLine::new("o1", "LAMP", 2)).unwrap();
    let mut chair = Product::new("CHAIR", vec![Batch::new("in-stock", "CHAIR", 5, None)]);
    chair.allocate(OrderLine::new("o1", "CHAIR", 1)).unwrap();

    store
        .save(vec![
            StagedProduct::new_product(lamp),
            StagedProduct::new_product(chair),
        ])
        .await
        .unwrap();

    let lamp = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
    let chair = store.load(&Sku::new("CHAIR")).await.unwrap().unwrap();
    let reference = BatchRef::new("in-stock");
    assert_eq!(lamp.batch(&reference).unwrap().available_quantity(), 18);
    assert_eq!(chair.batch(&reference).unwrap().available_quantity(), 4);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn zero_quantity_lines_are_stored() {
    let store = get_test_store().await;
    let mut product = lamp();
    let line = OrderLine::new("o1", "LAMP", 0);
    product.allocate(line.clone()).unwrap();

    store
        .save(vec![StagedProduct::new_product(product)])
        .await
        .unwrap();

    let loaded = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
    assert!(loaded.batch(&BatchRef::new("in-stock")).unwrap().is_allocated(&line));
}
