//! Catalog product records.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// Errors that can occur when constructing a [`Rating`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RatingError {
    /// The value is above the maximum star count.
    #[error("rating must be at most {max} (got {value})")]
    OutOfRange {
        /// The rejected value.
        value: u8,
        /// Maximum allowed rating.
        max: u8,
    },
}

/// Aggregate product rating, an integer number of stars out of five.
///
/// ## Examples
///
/// ```
/// use qkart_core::Rating;
///
/// assert!(Rating::new(0).is_ok());
/// assert!(Rating::new(5).is_ok());
/// assert!(Rating::new(6).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Highest possible rating.
    pub const MAX: u8 = 5;

    /// Create a rating.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::OutOfRange`] if `stars` exceeds [`Rating::MAX`].
    pub const fn new(stars: u8) -> Result<Self, RatingError> {
        if stars > Self::MAX {
            return Err(RatingError::OutOfRange {
                value: stars,
                max: Self::MAX,
            });
        }
        Ok(Self(stars))
    }

    /// Number of stars.
    #[must_use]
    pub const fn stars(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = RatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, Self::MAX)
    }
}

/// A purchasable item from the catalog.
///
/// Products are immutable once fetched. The whole catalog is replaced on each
/// successful fetch or search; individual products are never patched.
///
/// Field names follow the backend's JSON: `_id`, `cost` and `image` map to
/// [`id`](Self::id), [`unit_cost`](Self::unit_cost) and
/// [`image_url`](Self::image_url).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    #[serde(rename = "_id", alias = "id")]
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Category the product belongs to.
    pub category: String,
    /// Price of a single unit.
    #[serde(rename = "cost")]
    pub unit_cost: Decimal,
    /// Aggregate rating.
    pub rating: Rating,
    /// URL of the product image.
    #[serde(rename = "image")]
    pub image_url: String,
}
