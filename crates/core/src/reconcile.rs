//! Cart reconciliation.
//!
//! The backend stores carts as bare `(productId, qty)` pairs while the catalog
//! is fetched separately, possibly narrowed by a search. [`reconcile`] joins
//! the two into the line items the cart view renders.
//!
//! Entries whose product is not in the current catalog are dropped without
//! error: after a search the catalog only holds the matching subset, and the
//! cart view follows it.

use std::collections::HashMap;

use crate::types::{CartEntry, CartItem, Product, ProductId};

/// Merge a server cart with the catalog into ordered cart items.
///
/// Output order follows `cart` order. The function is pure: identical inputs
/// always yield identical output, so it can be re-run on every change to
/// either input.
///
/// # Example
///
/// ```
/// use std::num::NonZeroU32;
/// use qkart_core::{CartEntry, ProductId, reconcile};
///
/// let cart = vec![CartEntry::new(ProductId::new("gone"), NonZeroU32::MIN)];
/// assert!(reconcile(&cart, &[]).is_empty());
/// ```
#[must_use]
pub fn reconcile(cart: &[CartEntry], catalog: &[Product]) -> Vec<CartItem> {
    if cart.is_empty() || catalog.is_empty() {
        return Vec::new();
    }

    // First occurrence wins if the catalog ever repeats an id.
    let mut by_id: HashMap<&str, &Product> = HashMap::with_capacity(catalog.len());
    for product in catalog {
        by_id.entry(product.id.as_str()).or_insert(product);
    }

    cart.iter()
        .filter_map(|entry| {
            by_id
                .get(entry.product_id.as_str())
                .map(|product| CartItem::from_parts(entry, product))
        })
        .collect()
}

/// Whether `product_id` already has a line item among `items`.
#[must_use]
pub fn contains_product(items: &[CartItem], product_id: &ProductId) -> bool {
    items.iter().any(|item| &item.product_id == product_id)
}
