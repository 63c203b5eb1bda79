//! Server-held cart entries and the derived cart items the UI renders.

use std::num::NonZeroU32;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Product, ProductId, Rating};

/// One product/quantity record in a user's cart, as held by the backend.
///
/// The client only ever caches whole carts returned by the server. A zero
/// quantity cannot be represented: removal is expressed by the entry being
/// absent from the next cart the server returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    /// Product this entry refers to.
    #[serde(rename = "productId")]
    pub product_id: ProductId,
    /// Number of units in the cart.
    #[serde(rename = "qty")]
    pub quantity: NonZeroU32,
}

impl CartEntry {
    /// Create a cart entry.
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: NonZeroU32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A cart entry joined with its catalog product.
///
/// Cart items are view data: they are recomputed whenever the catalog or the
/// server cart changes and are never sent back to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub unit_cost: Decimal,
    pub rating: Rating,
    pub image_url: String,
    pub quantity: NonZeroU32,
}

impl CartItem {
    /// Join a cart entry with the product it refers to.
    ///
    /// The caller is responsible for matching ids; the entry's id wins.
    #[must_use]
    pub fn from_parts(entry: &CartEntry, product: &Product) -> Self {
        Self {
            product_id: entry.product_id.clone(),
            name: product.name.clone(),
            category: product.category.clone(),
            unit_cost: product.unit_cost,
            rating: product.rating,
            image_url: product.image_url.clone(),
            quantity: entry.quantity,
        }
    }

    /// Quantity times unit cost.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.quantity.get())
    }
}

/// Total value of all items in the cart.
#[must_use]
pub fn cart_total(items: &[CartItem]) -> Decimal {
    items.iter().map(CartItem::line_total).sum()
}

/// Total number of units across all items in the cart.
#[must_use]
pub fn cart_quantity(items: &[CartItem]) -> u32 {
    items
        .iter()
        .fold(0u32, |acc, item| acc.saturating_add(item.quantity.get()))
}
