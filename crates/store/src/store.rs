use async_trait::async_trait;
use common::{Sku, Version};
use domain::Product;

use crate::{Result, StoreError};

/// The version a product is expected to be at when it is saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The product must not exist yet.
    New,
    /// The product must still be at exactly this version.
    Exactly(Version),
}

/// A product staged for saving, with the version it was read at.
#[derive(Debug, Clone)]
pub struct StagedProduct {
    pub product: Product,
    pub expected: ExpectedVersion,
}

impl StagedProduct {
    /// Stages a product that was just created.
    pub fn new_product(product: Product) -> Self {
        Self {
            product,
            expected: ExpectedVersion::New,
        }
    }

    /// Stages a product that was loaded at its current version.
    pub fn loaded(product: Product) -> Self {
        let expected = ExpectedVersion::Exactly(product.version_number());
        Self { product, expected }
    }
}

/// Core trait for product storage backends.
///
/// Stores hold no locks between `load` and `save`; concurrent writers are
/// detected when they save.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Loads a product with all of its batches and allocations.
    ///
    /// Returns None if no product exists for the SKU.
    async fn load(&self, sku: &Sku) -> Result<Option<Product>>;

    /// Saves products atomically - either all are written or none are.
    ///
    /// Fails with `ConcurrencyConflict` if any stored version differs from
    /// the staged product's expected version.
    async fn save(&self, products: Vec<StagedProduct>) -> Result<()>;
}

/// Checks the stored version of a product against what the writer expects.
pub fn check_expected_version(
    sku: &Sku,
    expected: ExpectedVersion,
    current: Option<Version>,
) -> Result<()> {
    let conflict = match (expected, current) {
        (ExpectedVersion::New, None) => None,
        (ExpectedVersion::New, Some(actual)) => Some((Version::initial(), actual)),
        (ExpectedVersion::Exactly(expected), Some(actual)) if expected == actual => None,
        (ExpectedVersion::Exactly(expected), actual) => {
            Some((expected, actual.unwrap_or_else(Version::initial)))
        }
    };

    match conflict {
        None => Ok(()),
        Some((expected, actual)) => {
            metrics::counter!("store_commit_conflicts_total").increment(1);
            tracing::warn!(%sku, %expected, %actual, "optimistic concurrency conflict");
            Err(StoreError::ConcurrencyConflict {
                sku: sku.clone(),
                expected,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku() -> Sku {
        Sku::new("LAMP")
    }

    #[test]
    fn new_product_must_be_absent() {
        assert!(check_expected_version(&sku(), ExpectedVersion::New, None).is_ok());
        assert!(matches!(
            check_expected_version(&sku(), ExpectedVersion::New, Some(Version::new(1))),
            Err(StoreError::ConcurrencyConflict { .. })
        ));
    }

    #[test]
    fn loaded_product_must_be_unchanged() {
        let v1 = Version::new(1);
        assert!(check_expected_version(&sku(), ExpectedVersion::Exactly(v1), Some(v1)).is_ok());

        let err = check_expected_version(
            &sku(),
            ExpectedVersion::Exactly(v1),
            Some(Version::new(2)),
        )
        .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn loaded_product_that_vanished_conflicts() {
        let result =
            check_expected_version(&sku(), ExpectedVersion::Exactly(Version::new(3)), None);
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::initial()
        ));
    }
}
