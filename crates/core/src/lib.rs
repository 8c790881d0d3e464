//! openme core - shared domain types.
//!
//! This crate provides the types used by every openme component:
//! - `storefront` - Order intake, payment sessions and webhook reconciliation
//! - `cli` - Migrations and operator commands
//!
//! # Architecture
//!
//! The core crate contains only types, validation and pure state transitions -
//! no I/O, no database access, no HTTP clients. Persistence and the payment
//! provider live in the storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, statuses and addresses
//! - [`order`] - Order records, line snapshots and intake validation
//! - [`cart`] - Client-owned cart and wishlist aggregates

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod order;
pub mod types;

pub use cart::{Cart, CartError, CartLine, CartLineKey, StockLookup, StoredCart, Wishlist};
pub use order::{NewOrder, Order, OrderLine, ValidationError};
pub use types::*;
