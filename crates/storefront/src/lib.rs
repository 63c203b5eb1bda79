//! QKart Storefront - catalog, search and cart synchronization.
//!
//! This crate is the client-side core of the storefront. It keeps a product
//! catalog, the signed-in user's server-held cart and the line items derived
//! from both consistent while the visitor browses, searches and edits the
//! cart.
//!
//! # Architecture
//!
//! - [`api`] - The backend seam: an async trait and its reqwest client
//! - [`catalog`] / [`cart`] - Fetchers turning responses or failures into data
//! - [`search`] - Debouncing of search box input
//! - [`coordinator`] - Login and duplicate guards around cart mutations
//! - [`state`] - The watch channel holding catalog, cart and line items
//! - [`storefront`] - The facade a presentation layer drives
//!
//! Failures never escape as errors to the presentation layer; they are
//! turned into [`notify::Notification`]s and state resets.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod search;
pub mod session;
pub mod state;
pub mod storefront;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use api::{ApiError, HttpStorefrontApi, StorefrontApi};
pub use config::StorefrontConfig;
pub use coordinator::AddOptions;
pub use error::StorefrontError;
pub use notify::{Notification, Notifier, Severity};
pub use session::{CredentialStore, SessionProvider, SessionToken};
pub use state::StorefrontView;
pub use storefront::Storefront;
