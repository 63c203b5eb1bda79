//! QKart Core - Shared catalog and cart types.
//!
//! This crate provides the data model used by the storefront client:
//! - Products as returned by the catalog endpoints
//! - Cart entries as held by the backend
//! - Cart items, the derived join of the two that the UI renders
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no timers. Reconciliation lives here because it is a pure merge
//! that every layer above may re-run freely.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers and records for products and carts
//! - [`reconcile`] - Merging a server cart with the catalog into line items

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod reconcile;
pub mod types;

pub use reconcile::{contains_product, reconcile};
pub use types::*;
