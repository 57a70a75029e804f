//! Explicit cart scope for the UI layer.
//!
//! The app builds one [`CartProvider`] at startup, mounts the hydrated
//! [`CartStore`] into it, and passes the provider to whichever screens need the
//! cart. Reaching for the cart while nothing is mounted is a wiring mistake and
//! fails immediately with [`CartError::NotInitialized`].

use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::error::{CartError, Result};
use crate::store::CartStore;

/// Holder of the app's cart store.
#[derive(Debug, Default)]
pub struct CartProvider {
    store: RwLock<Option<CartStore>>,
}

impl CartProvider {
    /// Create a provider with no store mounted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with `store` already mounted.
    #[must_use]
    pub fn with_store(store: CartStore) -> Self {
        Self {
            store: RwLock::new(Some(store)),
        }
    }

    /// Mount a store, returning the previously mounted one, if any.
    pub fn mount(&self, store: CartStore) -> Option<CartStore> {
        debug!(key = store.storage_key(), "Mounting cart store");
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(store)
    }

    /// Remove the mounted store.
    pub fn unmount(&self) -> Option<CartStore> {
        debug!("Unmounting cart store");
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Whether a store is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Handle to the mounted store.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInitialized` if no store is mounted.
    pub fn cart(&self) -> Result<CartStore> {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CartError::NotInitialized)
    }
}
