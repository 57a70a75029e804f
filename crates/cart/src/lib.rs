//! Go Marketplace Cart - Persistent shopping cart store.
//!
//! Holds the cart line items for the app, keeps them in a single key-value
//! record on the device, and tells subscribers whenever the cart changes.
//!
//! # Architecture
//!
//! - [`CartStore`] owns the in-memory cart. It is hydrated from storage once,
//!   and every mutation is applied to a copy, written to storage, and only
//!   then published to readers and subscribers.
//! - [`storage::KeyValueStore`] is the async storage seam. [`storage::FileStore`]
//!   keeps records on local disk; [`storage::MemoryStore`] keeps them in
//!   process.
//! - [`CartProvider`] is the explicit scope through which the UI layer reaches
//!   the store. Accessing it before a store is mounted is an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use go_marketplace_cart::storage::MemoryStore;
//! use go_marketplace_cart::{CartConfig, CartProvider, CartStore};
//! use go_marketplace_core::{NewLineItem, Price};
//!
//! # async fn run() -> Result<(), go_marketplace_cart::CartError> {
//! let config = CartConfig::default();
//! let store = CartStore::open(Arc::new(MemoryStore::new()), &config).await;
//!
//! let provider = CartProvider::new();
//! provider.mount(store);
//!
//! let cart = provider.cart()?;
//! cart.add_to_cart(NewLineItem::new("p1", "Widget", "u", Price::from_cents(999)))
//!     .await;
//! assert_eq!(cart.products().len(), 1);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod events;
pub mod provider;
pub mod storage;
pub mod store;

pub use config::{CartConfig, ConfigError};
pub use error::{CartError, Result};
pub use events::{CartEvent, CartEventKind, SubscriptionId};
pub use provider::CartProvider;
pub use store::{CartStore, Hydration, MutationResult};
