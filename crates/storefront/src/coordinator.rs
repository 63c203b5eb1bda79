//! Guarded cart mutations.
//!
//! Every "add to cart" and quantity change goes through
//! [`CartCoordinator::add_or_update`], which applies the login and duplicate
//! guards before anything reaches the backend.

use std::sync::Arc;

use qkart_core::{CartEntry, CartItem, ProductId, contains_product};
use tracing::instrument;

use crate::cart::CartFetcher;
use crate::error::{Result, StorefrontError};
use crate::notify::Notifier;
use crate::session::SessionToken;
use crate::state::StorefrontState;

/// Options for [`CartCoordinator::add_or_update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Refuse the action when the product already has a line item.
    ///
    /// Set by the product card's "Add to cart"; quantity controls leave it
    /// off.
    pub prevent_duplicate: bool,
}

impl AddOptions {
    /// Options for the product card's "Add to cart" button.
    pub const ADD_TO_CART: Self = Self {
        prevent_duplicate: true,
    };

    /// Options for the cart's quantity controls.
    pub const QUANTITY_CONTROL: Self = Self {
        prevent_duplicate: false,
    };
}

/// Applies cart guards, performs the mutation and stores the server's reply.
#[derive(Clone)]
pub struct CartCoordinator {
    carts: CartFetcher,
    state: StorefrontState,
    notifier: Arc<dyn Notifier>,
}

impl CartCoordinator {
    /// Create a coordinator writing accepted carts into `state`.
    #[must_use]
    pub fn new(carts: CartFetcher, state: StorefrontState, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            carts,
            state,
            notifier,
        }
    }

    /// Set `product_id` to `quantity` units in the signed-in user's cart.
    ///
    /// Guards run in order and short-circuit: an anonymous visitor is told to
    /// log in, and with [`AddOptions::prevent_duplicate`] a product already
    /// among `current_items` is refused. Neither reaches the backend. On
    /// success the cached cart is replaced with the backend's reply.
    ///
    /// Every error has already been shown to the visitor when this returns.
    ///
    /// # Errors
    ///
    /// Returns the [`StorefrontError`] describing why the cart was not
    /// changed. The cached cart is left as it was.
    #[instrument(
        skip(self, token, current_items),
        fields(product_id = %product_id, signed_in = token.is_some())
    )]
    pub async fn add_or_update(
        &self,
        token: Option<&SessionToken>,
        current_items: &[CartItem],
        product_id: &ProductId,
        quantity: u32,
        options: AddOptions,
    ) -> Result<Vec<CartEntry>> {
        match self
            .mutate_guarded(token, current_items, product_id, quantity, options)
            .await
        {
            Ok(entries) => {
                self.state.replace_cart(entries.clone());
                Ok(entries)
            }
            Err(e) => self.reject(e),
        }
    }

    /// Refuse a cart action without contacting the backend.
    ///
    /// # Errors
    ///
    /// Always returns `error`, after reporting it and notifying the visitor.
    pub fn reject<T>(&self, error: StorefrontError) -> Result<T> {
        error.report();
        self.notifier.notify(error.notification());
        Err(error)
    }

    async fn mutate_guarded(
        &self,
        token: Option<&SessionToken>,
        current_items: &[CartItem],
        product_id: &ProductId,
        quantity: u32,
        options: AddOptions,
    ) -> Result<Vec<CartEntry>> {
        let token = token.ok_or(StorefrontError::AuthRequired)?;

        if options.prevent_duplicate && contains_product(current_items, product_id) {
            return Err(StorefrontError::DuplicateRejected(product_id.clone()));
        }

        self.carts
            .mutate_cart(token, product_id, quantity)
            .await
            .map_err(StorefrontError::from_mutation)
    }
}
