//! The cart: an ordered list of line items keyed by product ID.
//!
//! All operations here are pure and synchronous. Persistence and change
//! notification live in the `go-marketplace-cart` crate, which applies these
//! operations to a copy of the current cart before committing it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductId;
use super::line_item::{LineItem, NewLineItem};
use super::price::Price;
use super::quantity::Quantity;

/// Errors raised when building a cart from raw line items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartDataError {
    /// Two line items share a product ID.
    #[error("duplicate line item for product {0}")]
    DuplicateId(ProductId),
}

/// Outcome of a single cart operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartChange {
    /// A new line was appended with quantity 1.
    Added,
    /// An existing line gained a unit.
    Incremented { quantity: Quantity },
    /// An existing line lost a unit but is still present.
    Decremented { quantity: Quantity },
    /// The last unit was taken away and the line removed.
    Removed,
    /// No line matched the product ID.
    Unchanged,
}

impl CartChange {
    /// Whether the operation modified the cart.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Ordered sequence of line items with unique product IDs.
///
/// Serializes as a plain JSON array of line items. Deserializing an array
/// that repeats a product ID fails with [`CartDataError::DuplicateId`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LineItem>", into = "Vec<LineItem>")]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from line items, rejecting duplicate IDs.
    ///
    /// # Errors
    ///
    /// Returns `CartDataError::DuplicateId` for the first repeated ID.
    pub fn from_items(items: Vec<LineItem>) -> Result<Self, CartDataError> {
        for (i, item) in items.iter().enumerate() {
            if items.iter().skip(i + 1).any(|other| other.id == item.id) {
                return Err(CartDataError::DuplicateId(item.id.clone()));
            }
        }
        Ok(Self { items })
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Consume the cart, returning its line items.
    #[must_use]
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Look up a line by product ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Add one unit of a product.
    ///
    /// If the product is already in the cart this is the same as
    /// [`Cart::increment`]; the stored title, image and price are kept.
    /// Otherwise the product is appended with quantity 1.
    pub fn add(&mut self, item: NewLineItem) -> CartChange {
        if self.get(item.id.as_str()).is_some() {
            return self.increment(item.id.as_str());
        }
        self.items.push(item.into_line_item());
        CartChange::Added
    }

    /// Add one unit to an existing line. Unknown IDs are ignored.
    pub fn increment(&mut self, id: &str) -> CartChange {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.quantity = item.quantity.incremented();
                CartChange::Incremented {
                    quantity: item.quantity,
                }
            }
            None => CartChange::Unchanged,
        }
    }

    /// Take one unit from an existing line, removing it at zero.
    /// Unknown IDs are ignored.
    pub fn decrement(&mut self, id: &str) -> CartChange {
        let Some(pos) = self.items.iter().position(|item| item.id == id) else {
            return CartChange::Unchanged;
        };

        let Some(item) = self.items.get_mut(pos) else {
            return CartChange::Unchanged;
        };
        match item.quantity.decremented() {
            Some(quantity) => {
                item.quantity = quantity;
                CartChange::Decremented { quantity }
            }
            None => {
                self.items.remove(pos);
                CartChange::Removed
            }
        }
    }

    /// Totals for display.
    #[must_use]
    pub fn summary(&self) -> CartSummary {
        CartSummary {
            item_count: self
                .items
                .iter()
                .map(|item| u64::from(item.quantity.get()))
                .sum(),
            subtotal: self.items.iter().map(LineItem::line_total).sum(),
        }
    }
}

impl TryFrom<Vec<LineItem>> for Cart {
    type Error = CartDataError;

    fn try_from(items: Vec<LineItem>) -> Result<Self, Self::Error> {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<LineItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}

/// Derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartSummary {
    /// Sum of all line quantities.
    pub item_count: u64,
    /// Sum of unit price times quantity over all lines.
    pub subtotal: Price,
}

impl CartSummary {
    /// Subtotal formatted for display (e.g., "$19.99").
    #[must_use]
    pub fn display_subtotal(&self) -> String {
        self.subtotal.display()
    }
}
