//! QKart backend API client.
//!
//! Four endpoints, all JSON:
//!
//! - `GET  products` - full catalog
//! - `GET  products/search?value=` - filtered catalog, 404 when nothing matches
//! - `GET  cart` - the signed-in user's cart (bearer token)
//! - `POST cart` - add/update/remove one product, returns the whole cart
//!
//! [`StorefrontApi`] is the seam the rest of the crate talks to;
//! [`HttpStorefrontApi`] is the `reqwest` implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qkart_core::{CartEntry, Product, ProductId};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

use crate::session::SessionToken;

/// Longest response excerpt written to the log.
const LOG_BODY_LIMIT: usize = 500;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("API error: {status}{}", format_message(.message))]
    Status {
        status: u16,
        /// `message` from the backend's `{success: false, message}` body.
        message: Option<String>,
    },

    /// Response body was not the expected JSON.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// HTTP status of the response, if one arrived.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend answered 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.status(), Some(404))
    }

    /// Message supplied by the backend, if any.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Status {
                message: Some(message),
                ..
            } => Some(message),
            _ => None,
        }
    }
}

/// Operations the storefront needs from the backend.
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    /// Fetch every product.
    async fn list_products(&self) -> Result<Vec<Product>, ApiError>;

    /// Fetch products matching `query` by name or category.
    ///
    /// No match is reported as a 404 [`ApiError::Status`].
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError>;

    /// Fetch the signed-in user's cart.
    async fn get_cart(&self, token: &SessionToken) -> Result<Vec<CartEntry>, ApiError>;

    /// Set the quantity of one product (0 removes it) and return the whole
    /// updated cart.
    async fn update_cart(
        &self,
        token: &SessionToken,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Vec<CartEntry>, ApiError>;
}

/// Error body returned by the backend on failure.
#[derive(Debug, Deserialize)]
struct FailureBody {
    message: String,
}

/// Request body for `POST cart`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CartUpdateBody<'a> {
    product_id: &'a ProductId,
    qty: u32,
}

// =============================================================================
// HttpStorefrontApi
// =============================================================================

/// `reqwest`-backed client for the QKart backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpStorefrontApi {
    inner: Arc<HttpStorefrontApiInner>,
}

struct HttpStorefrontApiInner {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpStorefrontApi {
    /// Create a client for the backend rooted at `endpoint`.
    ///
    /// `timeout` of `None` keeps the transport default (no timeout).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(endpoint: Url, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            inner: Arc::new(HttpStorefrontApiInner {
                client,
                endpoint: with_trailing_slash(endpoint),
            }),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.endpoint.join(path)?)
    }
}

#[async_trait]
impl StorefrontApi for HttpStorefrontApi {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let response = self.inner.client.get(self.url("products")?).send().await?;
        read_json(response).await
    }

    #[instrument(skip(self))]
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError> {
        let mut url = self.url("products/search")?;
        url.query_pairs_mut().append_pair("value", query);

        let response = self.inner.client.get(url).send().await?;
        read_json(response).await
    }

    #[instrument(skip(self, token))]
    async fn get_cart(&self, token: &SessionToken) -> Result<Vec<CartEntry>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url("cart")?)
            .bearer_auth(token.expose())
            .send()
            .await?;
        read_json(response).await
    }

    #[instrument(skip(self, token), fields(product_id = %product_id))]
    async fn update_cart(
        &self,
        token: &SessionToken,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Vec<CartEntry>, ApiError> {
        let body = CartUpdateBody {
            product_id,
            qty: quantity,
        };

        let response = self
            .inner
            .client
            .post(self.url("cart")?)
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }
}

/// Read a response, mapping non-success statuses to [`ApiError::Status`].
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();

    // Get response body as text first for better error diagnostics
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<FailureBody>(&body)
            .ok()
            .map(|failure| failure.message);

        if status == StatusCode::NOT_FOUND {
            debug!(status = %status, "Backend returned not found");
        } else {
            error!(
                status = %status,
                body = %excerpt(&body),
                "Backend returned non-success status"
            );
        }

        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        error!(
            error = %e,
            body = %excerpt(&body),
            "Failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}

fn format_message(message: &Option<String>) -> String {
    message
        .as_deref()
        .map_or_else(String::new, |m| format!(" - {m}"))
}

fn excerpt(body: &str) -> String {
    body.chars().take(LOG_BODY_LIMIT).collect()
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Status {
            status: 400,
            message: Some("Protected route, Oauth2 Bearer token not found".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "API error: 400 - Protected route, Oauth2 Bearer token not found"
        );

        let err = ApiError::Status {
            status: 502,
            message: None,
        };
        assert_eq!(err.to_string(), "API error: 502");
    }

    #[test]
    fn test_api_error_accessors() {
        let err = ApiError::Status {
            status: 404,
            message: Some("Product doesn't exist".to_string()),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.backend_message(), Some("Product doesn't exist"));

        let err = ApiError::Parse(serde_json::from_str::<u8>("x").unwrap_err());
        assert!(!err.is_not_found());
        assert!(err.backend_message().is_none());
    }

    #[test]
    fn test_cart_update_body_wire_format() {
        let id = ProductId::new("BW0jAAeDJmlZCF8i");
        let body = CartUpdateBody {
            product_id: &id,
            qty: 2,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"productId":"BW0jAAeDJmlZCF8i","qty":2}"#
        );
    }

    #[test]
    fn test_failure_body_ignores_success_flag() {
        let body: FailureBody =
            serde_json::from_str(r#"{"success":false,"message":"nope"}"#).unwrap();
        assert_eq!(body.message, "nope");
    }

    #[test]
    fn test_endpoint_gets_trailing_slash() {
        let api = HttpStorefrontApi::new(Url::parse("http://localhost:8082/v1").unwrap(), None)
            .unwrap();
        assert_eq!(api.endpoint().as_str(), "http://localhost:8082/v1/");
        assert_eq!(
            api.url("cart").unwrap().as_str(),
            "http://localhost:8082/v1/cart"
        );
    }
}
