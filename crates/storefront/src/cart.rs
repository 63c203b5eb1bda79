//! Cart fetching and mutation.
//!
//! The backend owns the cart. Every successful call returns the full
//! authoritative cart, which callers cache wholesale; nothing here edits a
//! cached cart in place.

use std::sync::Arc;

use qkart_core::{CartEntry, ProductId};
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, StorefrontApi};
use crate::error::capture_transport_error;
use crate::notify::{Notification, Notifier, messages};
use crate::session::{SessionProvider, SessionToken};

/// Reads and writes the signed-in user's cart.
#[derive(Clone)]
pub struct CartFetcher {
    api: Arc<dyn StorefrontApi>,
    session: Arc<dyn SessionProvider>,
    notifier: Arc<dyn Notifier>,
}

impl CartFetcher {
    /// Create a cart fetcher.
    #[must_use]
    pub fn new(
        api: Arc<dyn StorefrontApi>,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            session,
            notifier,
        }
    }

    /// Current session token from the injected provider.
    #[must_use]
    pub fn session_token(&self) -> Option<SessionToken> {
        self.session.session_token()
    }

    /// Fetch the cart for `token`.
    ///
    /// Returns `None` without a request when `token` is absent. On failure
    /// the visitor is notified and `None` is returned; callers keep whatever
    /// cart they already had.
    #[instrument(skip_all, fields(signed_in = token.is_some()))]
    pub async fn fetch_cart(&self, token: Option<&SessionToken>) -> Option<Vec<CartEntry>> {
        let token = token?;

        match self.api.get_cart(token).await {
            Ok(entries) => {
                debug!(entries = entries.len(), "Cart loaded");
                Some(entries)
            }
            Err(e) => {
                let notification = match (e.status(), e.backend_message()) {
                    (Some(400), Some(message)) => {
                        warn!(backend_message = message, "Backend refused cart fetch");
                        Notification::error(message)
                    }
                    _ => {
                        capture_transport_error(&e);
                        Notification::error(messages::CART_FETCH_FAILED)
                    }
                };
                self.notifier.notify(notification);
                None
            }
        }
    }

    /// Fetch the cart for the current session.
    pub async fn fetch_current(&self) -> Option<Vec<CartEntry>> {
        let token = self.session_token();
        self.fetch_cart(token.as_ref()).await
    }

    /// Set `product_id` to `quantity` units (0 removes it).
    ///
    /// # Errors
    ///
    /// Returns the transport or backend error unchanged; the caller decides
    /// how to surface it.
    #[instrument(skip(self, token), fields(product_id = %product_id))]
    pub async fn mutate_cart(
        &self,
        token: &SessionToken,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Vec<CartEntry>, ApiError> {
        let entries = self.api.update_cart(token, product_id, quantity).await?;
        debug!(entries = entries.len(), "Cart updated");
        Ok(entries)
    }
}
