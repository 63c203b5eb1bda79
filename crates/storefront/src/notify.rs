//! User-facing notifications.
//!
//! Failures inside the storefront never escape as errors to the presentation
//! layer; they become [`Notification`]s handed to a [`Notifier`]. How they are
//! shown (toast, snackbar, status line) is up to the host.

use std::fmt;

use tokio::sync::mpsc;
use tracing::{info, warn};

/// Fixed notification messages.
pub mod messages {
    /// Loading the full catalog failed.
    pub const CATALOG_LOAD_FAILED: &str =
        "Something went wrong. Check the backend console for more details";

    /// A search request failed for a reason other than "no results".
    pub const SEARCH_FAILED: &str = "Something went wrong. Check that the backend is running, reachable and returns valid JSON.";

    /// Fetching the cart failed without a backend message.
    pub const CART_FETCH_FAILED: &str = "Could not fetch cart details. Check that the backend is running, reachable and returns valid JSON.";

    /// Updating the cart failed without a backend message.
    pub const CART_UPDATE_FAILED: &str = "Could not update cart. Check that the backend is running, reachable and returns valid JSON.";

    /// A cart action was attempted while anonymous.
    pub const LOGIN_REQUIRED: &str = "Login to add an item to the Cart";

    /// "Add to cart" was clicked for a product already in the cart.
    pub const ALREADY_IN_CART: &str =
        "Item already in cart. Use the cart sidebar to update quantity or remove item.";

    /// A quantity control was used for a product the cart no longer holds.
    pub const NOT_IN_CART: &str = "Item is not in the cart. Refresh the cart and try again.";
}

/// How prominently a notification should be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Success,
    Info,
}

impl Severity {
    /// Lowercase name, as used by toast libraries (`"error"`, `"warning"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Success => "success",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message for the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    /// Create an error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    /// Create a warning notification.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Delivers notifications to the visitor.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Notifier that only writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Error | Severity::Warning => warn!(
                severity = %notification.severity,
                text = %notification.message,
                "Notification"
            ),
            Severity::Success | Severity::Info => info!(
                severity = %notification.severity,
                text = %notification.message,
                "Notification"
            ),
        }
    }
}

/// Notifier that forwards notifications over an unbounded channel.
///
/// The receiving half is typically drained by the UI task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver its notifications arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            // Receiver dropped (UI gone); the message still goes to the log
            TracingNotifier.notify(e.0);
        }
    }
}
