//! Core types for QKart.
//!
//! This module provides type-safe wrappers for catalog and cart concepts.

pub mod cart;
pub mod id;
pub mod product;

pub use cart::{CartEntry, CartItem, cart_quantity, cart_total};
pub use id::ProductId;
pub use product::{Product, Rating, RatingError};
