//! Client state shared between the storefront and its subscribers.
//!
//! Catalog, cached server cart, derived line items and the loading flag live
//! in one watch channel. Every write recomputes the line items inside the
//! same modification, so a subscriber never sees a cart that disagrees with
//! the catalog it was joined against.

use std::sync::Arc;

use qkart_core::{CartEntry, CartItem, Product, cart_quantity, cart_total, reconcile};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::debug;

/// Snapshot of everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorefrontView {
    /// Products currently shown.
    pub catalog: Vec<Product>,
    /// Last cart returned by the backend.
    pub cart: Vec<CartEntry>,
    /// `cart` joined against `catalog`.
    pub line_items: Vec<CartItem>,
    /// Whether a catalog request is outstanding.
    pub loading: bool,
    latest_catalog_request: u64,
}

impl StorefrontView {
    /// Whether the catalog has nothing to show.
    #[must_use]
    pub fn is_catalog_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Sum of quantity × unit cost over the line items.
    #[must_use]
    pub fn cart_total(&self) -> Decimal {
        cart_total(&self.line_items)
    }

    /// Number of units across the line items.
    #[must_use]
    pub fn cart_quantity(&self) -> u32 {
        cart_quantity(&self.line_items)
    }

    fn recompute(&mut self) {
        self.line_items = reconcile(&self.cart, &self.catalog);
    }
}

/// Identifies one catalog request. Only the most recently issued ticket may
/// replace the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CatalogTicket(u64);

/// Shared, cheaply cloneable handle to the storefront state.
#[derive(Clone)]
pub struct StorefrontState {
    tx: Arc<watch::Sender<StorefrontView>>,
}

impl Default for StorefrontState {
    fn default() -> Self {
        Self::new()
    }
}

impl StorefrontState {
    /// Create empty state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StorefrontView::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot.
    #[must_use]
    pub fn view(&self) -> StorefrontView {
        self.tx.borrow().clone()
    }

    /// Receiver that is notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StorefrontView> {
        self.tx.subscribe()
    }

    /// Start a catalog request: issue a new ticket and raise the loading flag.
    pub fn begin_catalog_request(&self) -> CatalogTicket {
        let mut ticket = CatalogTicket(0);
        self.tx.send_modify(|view| {
            view.latest_catalog_request += 1;
            view.loading = true;
            ticket = CatalogTicket(view.latest_catalog_request);
        });
        ticket
    }

    /// Apply the response to a catalog request.
    ///
    /// Returns `false` and leaves the state untouched when a newer request
    /// has been issued since `ticket`.
    pub fn finish_catalog_request(&self, ticket: CatalogTicket, products: Vec<Product>) -> bool {
        self.tx.send_if_modified(|view| {
            if view.latest_catalog_request != ticket.0 {
                debug!(
                    ticket = ticket.0,
                    latest = view.latest_catalog_request,
                    "Discarding stale catalog response"
                );
                return false;
            }
            view.catalog = products;
            view.loading = false;
            view.recompute();
            true
        })
    }

    /// Replace the cached server cart.
    pub fn replace_cart(&self, entries: Vec<CartEntry>) {
        self.tx.send_modify(|view| {
            view.cart = entries;
            view.recompute();
        });
    }
}

impl std::fmt::Debug for StorefrontState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontState")
            .field("view", &*self.tx.borrow())
            .finish()
    }
}
