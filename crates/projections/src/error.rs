//! Projection error types.

use thiserror::Error;

/// Errors that can occur while updating a read model.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The read model's backing storage could not be written.
    #[error("Read model unavailable: {0}")]
    Unavailable(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
