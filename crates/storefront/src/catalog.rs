//! Catalog fetching.
//!
//! Both operations always produce a complete replacement catalog. A failed
//! fetch yields an empty catalog rather than leaving stale products on
//! screen.

use std::sync::Arc;

use qkart_core::Product;
use tracing::{debug, instrument};

use crate::api::StorefrontApi;
use crate::error::capture_transport_error;
use crate::notify::{Notification, Notifier, messages};

/// Fetches the full or search-narrowed product list.
#[derive(Clone)]
pub struct CatalogFetcher {
    api: Arc<dyn StorefrontApi>,
    notifier: Arc<dyn Notifier>,
}

impl CatalogFetcher {
    /// Create a catalog fetcher.
    #[must_use]
    pub fn new(api: Arc<dyn StorefrontApi>, notifier: Arc<dyn Notifier>) -> Self {
        Self { api, notifier }
    }

    /// Fetch every product.
    ///
    /// On failure the visitor is notified and the returned catalog is empty.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Vec<Product> {
        match self.api.list_products().await {
            Ok(products) => {
                debug!(count = products.len(), "Catalog loaded");
                products
            }
            Err(e) => {
                capture_transport_error(&e);
                self.notifier
                    .notify(Notification::error(messages::CATALOG_LOAD_FAILED));
                Vec::new()
            }
        }
    }

    /// Fetch products matching `query`.
    ///
    /// "Not found" is an ordinary empty result. Any other failure notifies
    /// the visitor; the returned catalog is empty either way.
    #[instrument(skip(self))]
    pub async fn fetch_filtered(&self, query: &str) -> Vec<Product> {
        match self.api.search_products(query).await {
            Ok(products) => {
                debug!(count = products.len(), "Search results loaded");
                products
            }
            Err(e) if e.is_not_found() => {
                debug!("No products match search");
                Vec::new()
            }
            Err(e) => {
                capture_transport_error(&e);
                self.notifier
                    .notify(Notification::error(messages::SEARCH_FAILED));
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::notify::ChannelNotifier;
    use crate::testing::{FakeApi, product};

    fn fetcher(api: &Arc<FakeApi>) -> (CatalogFetcher, tokio::sync::mpsc::UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::channel();
        let api: Arc<dyn StorefrontApi> = api.clone();
        (CatalogFetcher::new(api, Arc::new(notifier)), rx)
    }

    #[tokio::test]
    async fn test_fetch_all_returns_catalog() {
        let api = Arc::new(FakeApi::with_catalog(vec![
            product("A", "Widget", 10),
            product("B", "Gadget", 20),
        ]));
        let (catalog, mut rx) = fetcher(&api);

        let products = catalog.fetch_all().await;

        assert_eq!(products.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fetch_all_failure_is_empty_and_notifies() {
        let api = Arc::new(FakeApi::with_catalog(vec![product("A", "Widget", 10)]));
        api.fail_catalog(500);
        let (catalog, mut rx) = fetcher(&api);

        assert!(catalog.fetch_all().await.is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::error(messages::CATALOG_LOAD_FAILED)
        );
    }

    #[tokio::test]
    async fn test_fetch_filtered_matches() {
        let api = Arc::new(FakeApi::with_catalog(vec![
            product("A", "Widget", 10),
            product("B", "Gadget", 20),
        ]));
        let (catalog, _rx) = fetcher(&api);

        let products = catalog.fetch_filtered("gad").await;

        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id.as_str(), "B");
        assert_eq!(api.search_queries(), ["gad"]);
    }

    #[tokio::test]
    async fn test_fetch_filtered_not_found_is_silent() {
        let api = Arc::new(FakeApi::with_catalog(vec![product("A", "Widget", 10)]));
        let (catalog, mut rx) = fetcher(&api);

        assert!(catalog.fetch_filtered("zzz-nomatch").await.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fetch_filtered_failure_notifies() {
        let api = Arc::new(FakeApi::with_catalog(vec![product("A", "Widget", 10)]));
        api.fail_catalog(503);
        let (catalog, mut rx) = fetcher(&api);

        assert!(catalog.fetch_filtered("widget").await.is_empty());
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::error(messages::SEARCH_FAILED)
        );
    }
}
