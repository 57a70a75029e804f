//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! gm-cli cart show
//! gm-cli cart add --id p1 --title "Widget" --image-url u --price 9.99
//! gm-cli cart decrement p1
//! ```
//!
//! # Environment Variables
//!
//! - `CART_STORAGE_DIR` - Directory holding the cart record
//! - `CART_STORAGE_KEY` - Key of the cart record

use std::path::PathBuf;
use std::sync::Arc;

use go_marketplace_cart::storage::FileStore;
use go_marketplace_cart::{
    CartConfig, CartError, CartProvider, CartStore, ConfigError, Hydration, MutationResult,
};
use go_marketplace_core::{CartChange, LineItem, NewLineItem, Price};
use thiserror::Error;

/// Errors that can occur during cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cart access failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Price argument is not a decimal number.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// The change was applied but could not be saved.
    #[error("Cart change was not saved to {0}")]
    NotPersisted(String),

    /// JSON output failed.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Load configuration, open the file-backed store and mount it.
///
/// # Arguments
///
/// * `storage_dir` - Overrides `CART_STORAGE_DIR` when set
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub async fn mount(storage_dir: Option<PathBuf>) -> Result<CartProvider, CartCommandError> {
    let mut config = CartConfig::from_env()?;
    if let Some(dir) = storage_dir {
        config.storage_dir = dir;
    }

    let storage = FileStore::new(&config.storage_dir);
    tracing::debug!(path = %storage.path_for(&config.storage_key).display(), "Opening cart");

    let store = CartStore::new(Arc::new(storage), &config);
    let hydration = store.load().await;
    if hydration == Hydration::Discarded {
        tracing::warn!("Existing cart record could not be used, starting empty");
    }

    Ok(CartProvider::with_store(store))
}

/// Print the cart.
///
/// # Errors
///
/// Returns an error if no cart is mounted or JSON encoding fails.
#[allow(clippy::print_stdout)]
pub fn show(provider: &CartProvider, json: bool) -> Result<(), CartCommandError> {
    let store = provider.cart()?;
    let products = store.products();

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }

    for item in &products {
        println!("{}", format_line(item));
    }
    let summary = store.summary();
    println!(
        "{} item(s), subtotal {}",
        summary.item_count,
        summary.display_subtotal()
    );
    Ok(())
}

/// Add one unit of a product.
///
/// # Errors
///
/// Returns an error if the price is invalid, no cart is mounted, or the
/// change could not be saved.
pub async fn add(
    provider: &CartProvider,
    id: String,
    title: String,
    image_url: String,
    price: &str,
) -> Result<(), CartCommandError> {
    let price: Price = price
        .parse()
        .map_err(|_| CartCommandError::InvalidPrice(price.to_owned()))?;
    let store = provider.cart()?;

    let item = NewLineItem::new(id, title, image_url, price);
    let id = item.id.clone();
    let result = store.add_to_cart(item).await;
    report(&store, id.as_str(), result)
}

/// Add one unit to an existing line.
///
/// # Errors
///
/// Returns an error if no cart is mounted or the change could not be saved.
pub async fn increment(provider: &CartProvider, id: &str) -> Result<(), CartCommandError> {
    let store = provider.cart()?;
    let result = store.increment(id).await;
    report(&store, id, result)
}

/// Take one unit from an existing line.
///
/// # Errors
///
/// Returns an error if no cart is mounted or the change could not be saved.
pub async fn decrement(provider: &CartProvider, id: &str) -> Result<(), CartCommandError> {
    let store = provider.cart()?;
    let result = store.decrement(id).await;
    report(&store, id, result)
}

#[allow(clippy::print_stdout)]
fn report(store: &CartStore, id: &str, result: MutationResult) -> Result<(), CartCommandError> {
    println!("{}", describe_change(id, result.change));

    if !result.persisted {
        return Err(CartCommandError::NotPersisted(
            store.storage_key().to_string(),
        ));
    }
    Ok(())
}

fn describe_change(id: &str, change: CartChange) -> String {
    match change {
        CartChange::Added => format!("Added {id} (quantity 1)"),
        CartChange::Incremented { quantity } | CartChange::Decremented { quantity } => {
            format!("{id}: quantity {quantity}")
        }
        CartChange::Removed => format!("Removed {id}"),
        CartChange::Unchanged => format!("{id} is not in the cart"),
    }
}

fn format_line(item: &LineItem) -> String {
    format!(
        "{:>4} x {} ({}) @ {} = {}",
        item.quantity,
        item.title,
        item.id,
        item.price,
        item.line_total()
    )
}
