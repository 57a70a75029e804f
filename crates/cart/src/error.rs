//! Cart error types.
//!
//! Storage and serialization failures during normal operation are absorbed by
//! the store and logged. The variants here surface where a caller can act on
//! them: wiring mistakes and direct storage access.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by the cart crate.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart was accessed outside of a mounted `CartProvider`.
    #[error("cart accessed outside of a mounted CartProvider")]
    NotInitialized,

    /// Storage backend failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The cart record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
