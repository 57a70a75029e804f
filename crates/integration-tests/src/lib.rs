//! Integration tests for Go Marketplace.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p go-marketplace-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_persistence` - File-backed cart round-trips across store restarts
//! - `cart_provider` - Provider scope and subscriptions as the UI layer sees them
//!
//! This crate also provides the shared fixtures those tests use.

use std::path::Path;
use std::sync::Arc;

use go_marketplace_cart::storage::FileStore;
use go_marketplace_cart::{CartConfig, CartStore};
use go_marketplace_core::{NewLineItem, Price};

/// Configuration pointing at `dir`, with every other setting at its default.
#[must_use]
pub fn config_in(dir: &Path) -> CartConfig {
    CartConfig {
        storage_dir: dir.to_path_buf(),
        ..CartConfig::default()
    }
}

/// Open a hydrated file-backed store in `dir`, as the app does at startup.
pub async fn open_store(dir: &Path) -> CartStore {
    let config = config_in(dir);
    CartStore::open(Arc::new(FileStore::new(&config.storage_dir)), &config).await
}

/// A catalog product priced in cents.
#[must_use]
pub fn product(id: &str, title: &str, cents: i64) -> NewLineItem {
    NewLineItem::new(id, title, format!("https://img.example/{id}.png"), Price::from_cents(cents))
}
