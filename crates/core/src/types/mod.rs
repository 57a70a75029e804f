//! Core types for Go Marketplace.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod cart;
pub mod id;
pub mod line_item;
pub mod price;
pub mod quantity;

pub use cart::{Cart, CartChange, CartDataError, CartSummary};
pub use id::ProductId;
pub use line_item::{LineItem, NewLineItem};
pub use price::Price;
pub use quantity::{Quantity, QuantityError};
