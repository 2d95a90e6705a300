use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::Sku;
use domain::Product;
use tokio::sync::RwLock;

use crate::{
    Result,
    store::{ProductStore, StagedProduct, check_expected_version},
};

/// In-memory product store for testing and local runs.
///
/// Clones share the same underlying state, and saves are atomic under a
/// single write lock, matching the guarantees of the PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<Sku, Product>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with products.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let products = products
            .into_iter()
            .map(|product| (product.sku().clone(), product))
            .collect();
        Self {
            products: Arc::new(RwLock::new(products)),
            saves: Arc::default(),
        }
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns the number of successful saves (committed units of work).
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Clears all products.
    pub async fn clear(&self) {
        self.products.write().await.clear();
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn load(&self, sku: &Sku) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(sku).cloned())
    }

    async fn save(&self, staged: Vec<StagedProduct>) -> Result<()> {
        let mut products = self.products.write().await;

        // Check every version before writing anything
        for entry in &staged {
            let sku = entry.product.sku();
            let current = products.get(sku).map(Product::version_number);
            check_expected_version(sku, entry.expected, current)?;
        }

        for entry in staged {
            let mut product = entry.product;
            product.take_events();
            products.insert(product.sku().clone(), product);
        }

        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use common::Version;
    use domain::{Batch, OrderLine};

    fn lamp() -> Product {
        Product::new("LAMP", vec![Batch::new("b1", "LAMP", 10, None)])
    }

    #[tokio::test]
    async fn save_and_load_new_product() {
        let store = InMemoryProductStore::new();

        store
            .save(vec![StagedProduct::new_product(lamp())])
            .await
            .unwrap();

        let loaded = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
        assert_eq!(loaded.batches().len(), 1);
        assert_eq!(store.product_count().await, 1);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn saving_a_new_product_twice_conflicts() {
        let store = InMemoryProductStore::new();
        store
            .save(vec![StagedProduct::new_product(lamp())])
            .await
            .unwrap();

        let result = store.save(vec![StagedProduct::new_product(lamp())]).await;

        assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn stale_writer_loses() {
        let store = InMemoryProductStore::with_products([lamp()]);
        let sku = Sku::new("LAMP");

        let mut first = store.load(&sku).await.unwrap().unwrap();
        let mut second = store.load(&sku).await.unwrap().unwrap();
        let expected = first.version_number();

        first.allocate(OrderLine::new("o1", "LAMP", 1)).unwrap();
        second.allocate(OrderLine::new("o2", "LAMP", 1)).unwrap();

        let stage = |product: Product| StagedProduct {
            product,
            expected: crate::ExpectedVersion::Exactly(expected),
        };
        store.save(vec![stage(first)]).await.unwrap();
        let result = store.save(vec![stage(second)]).await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(1)
        ));
        let stored = store.load(&sku).await.unwrap().unwrap();
        assert_eq!(stored.batches()[0].allocations().count(), 1);
    }

    #[tokio::test]
    async fn failed_save_writes_nothing() {
        let store = InMemoryProductStore::with_products([lamp()]);

        let fresh = Product::new("CHAIR", vec![]);
        let stale = StagedProduct {
            product: lamp(),
            expected: crate::ExpectedVersion::Exactly(Version::new(99)),
        };
        let result = store
            .save(vec![StagedProduct::new_product(fresh), stale])
            .await;

        assert!(result.is_err());
        assert!(store.load(&Sku::new("CHAIR")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pending_events_are_not_stored() {
        let store = InMemoryProductStore::new();
        let mut product = lamp();
        product
            .allocate(OrderLine::new("o1", "LAMP", 100))
            .unwrap();
        assert!(!product.pending_events().is_empty());

        store
            .save(vec![StagedProduct::new_product(product)])
            .await
            .unwrap();

        let loaded = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
        assert!(loaded.pending_events().is_empty());
    }

    #[tokio::test]
    async fn batch_reference_is_scoped_to_its_product() {
        let store = InMemoryProductStore::new();
        let chair = Product::new("CHAIR", vec![Batch::new("b1", "CHAIR", 5, None)]);

        store
            .save(vec![
                StagedProduct::new_product(lamp()),
                StagedProduct::new_product(chair),
            ])
            .await
            .unwrap();

        assert_eq!(store.product_count().await, 2);
    }

    #[tokio::test]
    async fn zero_quantity_lines_are_stored() {
        let store = InMemoryProductStore::new();
        let mut product = lamp();
        let line = OrderLine::new("o1", "LAMP", 0);
        product.allocate(line.clone()).unwrap();

        store
            .save(vec![StagedProduct::new_product(product)])
            .await
            .unwrap();

        let loaded = store.load(&Sku::new("LAMP")).await.unwrap().unwrap();
        assert!(loaded.batches()[0].is_allocated(&line));
    }
}
