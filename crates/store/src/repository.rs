//! Per-scope product repository.

use std::collections::HashMap;

use common::Sku;
use domain::Product;

use crate::Result;
use crate::store::{ProductStore, StagedProduct};

/// Identity map of the products touched during one unit-of-work scope.
///
/// Each product is loaded from the store at most once per scope; later
/// lookups return the same in-memory instance. Every product added or loaded
/// is "seen", which is how the unit of work finds the events they raised.
pub struct Repository<'a, S: ProductStore + ?Sized> {
    store: &'a S,
    seen: HashMap<Sku, StagedProduct>,
}

impl<'a, S: ProductStore + ?Sized> Repository<'a, S> {
    /// Creates an empty repository over the given store.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            seen: HashMap::new(),
        }
    }

    /// Adds a newly created product.
    pub fn add(&mut self, product: Product) {
        let sku = product.sku().clone();
        self.seen.insert(sku, StagedProduct::new_product(product));
    }

    /// Returns the product for a SKU, loading it on first access.
    pub async fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>> {
        if !self.seen.contains_key(sku) {
            let Some(product) = self.store.load(sku).await? else {
                return Ok(None);
            };
            self.seen
                .insert(sku.clone(), StagedProduct::loaded(product));
        }

        Ok(self.seen.get_mut(sku).map(|staged| &mut staged.product))
    }

    /// Returns every product seen in this scope.
    pub fn seen(&self) -> impl Iterator<Item = &Product> {
        self.seen.values().map(|staged| &staged.product)
    }

    /// Removes and returns everything seen, ready to be saved.
    pub fn take_staged(&mut self) -> Vec<StagedProduct> {
        std::mem::take(&mut self.seen).into_values().collect()
    }
}
