//! Async key-value storage used to persist the cart record.
//!
//! The cart only ever needs `get` and `set` on a single string key, so the
//! trait stays that small. Backends:
//!
//! - [`FileStore`] - one file per key in a local directory
//! - [`MemoryStore`] - in-process map, with optional failure injection

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend refused or could not serve the request.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Async string key-value store.
///
/// Both operations may fail; callers decide whether a failure is fatal.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
