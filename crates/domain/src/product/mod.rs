//! Product aggregate and related types.

mod aggregate;
mod batch;
mod commands;
mod events;
mod value_objects;

pub use aggregate::Product;
pub use batch::Batch;
pub use commands::{Allocate, ChangeBatchQuantity, Command, CommandKind, CreateBatch};
pub use events::{Allocated, Deallocated, Event, EventKind, OutOfStock};
pub use value_objects::OrderLine;

use common::{BatchRef, Sku};
use thiserror::Error;

/// Errors that can occur during product operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The line or batch belongs to a different product.
    #[error("SKU mismatch: product is {expected}, got {actual}")]
    SkuMismatch { expected: Sku, actual: Sku },

    /// No batch with this reference exists on the product.
    #[error("Batch not found: {reference}")]
    BatchNotFound { reference: BatchRef },

    /// A batch with this reference already exists on the product.
    #[error("Batch already exists: {reference}")]
    DuplicateBatch { reference: BatchRef },
}
