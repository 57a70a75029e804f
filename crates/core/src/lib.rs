//! Go Marketplace Core - Shared cart types.
//!
//! This crate provides the domain types used across all Go Marketplace components:
//! - `cart` - Persistent cart store consumed by the UI layer
//! - `cli` - Command-line tool for inspecting and editing a local cart
//!
//! # Architecture
//!
//! The core crate contains only types and pure cart logic - no I/O, no storage
//! access, no async runtime. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, prices, quantities, line items and the cart itself

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
