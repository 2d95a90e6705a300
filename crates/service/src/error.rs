//! Service layer error types.

use common::Sku;
use domain::{AllocationError, CommandKind};
use projections::ProjectionError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur while handling a message.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The command names a SKU no product exists for.
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    /// The product rejected the change.
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    /// Loading or saving products failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A read model could not be updated.
    #[error("Read model error: {0}")]
    Projection(#[from] ProjectionError),

    /// A notification could not be sent.
    #[error("Notification error: {0}")]
    Notification(String),

    /// An event could not be published.
    #[error("Publish error: {0}")]
    Publish(String),

    /// No command handler is registered for this kind of command.
    #[error("No handler registered for {0}")]
    NoHandler(CommandKind),
}

impl ServiceError {
    /// Returns true if the error is a lost optimistic concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Store(err) if err.is_conflict())
    }
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
