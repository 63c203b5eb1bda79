//! Storefront error taxonomy with Sentry integration.
//!
//! Every failure a visitor can cause or observe maps to a [`StorefrontError`]
//! and from there to exactly one [`Notification`]. Transport failures are
//! captured to Sentry; policy rejections are expected and only logged.

use qkart_core::ProductId;
use thiserror::Error;

use crate::api::ApiError;
use crate::notify::{Notification, messages};

/// What went wrong with a storefront action.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// A cart action was attempted without a session token.
    #[error("login required")]
    AuthRequired,

    /// "Add to cart" for a product that already has a line item.
    #[error("product {0} is already in the cart")]
    DuplicateRejected(ProductId),

    /// A quantity control for a product the cached cart does not hold.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    /// The backend rejected the request and said why.
    #[error("backend rejected request: {0}")]
    BackendMessage(String),

    /// Network or server failure without a usable message.
    #[error("transport failure: {0}")]
    Transport(#[source] ApiError),
}

impl StorefrontError {
    /// Classify a failed cart mutation.
    ///
    /// Any backend-supplied message is surfaced verbatim; everything else is a
    /// transport failure.
    #[must_use]
    pub fn from_mutation(error: ApiError) -> Self {
        match error.backend_message() {
            Some(message) => Self::BackendMessage(message.to_string()),
            None => Self::Transport(error),
        }
    }

    /// Notification shown to the visitor for this error.
    #[must_use]
    pub fn notification(&self) -> Notification {
        match self {
            Self::AuthRequired => Notification::error(messages::LOGIN_REQUIRED),
            Self::DuplicateRejected(_) => Notification::warning(messages::ALREADY_IN_CART),
            Self::NotInCart(_) => Notification::warning(messages::NOT_IN_CART),
            Self::BackendMessage(message) => Notification::error(message.clone()),
            Self::Transport(_) => Notification::error(messages::CART_UPDATE_FAILED),
        }
    }

    /// Log the error at a level matching its kind, capturing transport
    /// failures to Sentry.
    pub fn report(&self) {
        match self {
            Self::AuthRequired | Self::DuplicateRejected(_) | Self::NotInCart(_) => {
                tracing::info!(error = %self, "Cart action rejected");
            }
            Self::BackendMessage(_) => {
                tracing::warn!(error = %self, "Cart action refused by backend");
            }
            Self::Transport(_) => capture_transport_error(self),
        }
    }
}

/// Capture a transport failure to Sentry and the error log.
pub fn capture_transport_error(error: &(dyn std::error::Error + 'static)) {
    let event_id = sentry::capture_error(error);
    tracing::error!(
        error = %error,
        sentry_event_id = %event_id,
        "Storefront request failed"
    );
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;
