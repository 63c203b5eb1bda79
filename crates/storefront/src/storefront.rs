//! The storefront facade.
//!
//! [`Storefront`] wires the fetchers, the debouncer, the coordinator and the
//! shared state together. A presentation layer calls its operations and
//! renders [`StorefrontView`] snapshots; failures surface only as
//! notifications and state resets.

use std::sync::Arc;
use std::time::Duration;

use qkart_core::{CartEntry, ProductId};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::api::{ApiError, HttpStorefrontApi, StorefrontApi};
use crate::cart::CartFetcher;
use crate::catalog::CatalogFetcher;
use crate::config::StorefrontConfig;
use crate::coordinator::{AddOptions, CartCoordinator};
use crate::error::{Result, StorefrontError};
use crate::notify::Notifier;
use crate::search::SearchDebouncer;
use crate::session::SessionProvider;
use crate::state::{StorefrontState, StorefrontView};

/// Storefront client core.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    catalog: CatalogFetcher,
    carts: CartFetcher,
    coordinator: CartCoordinator,
    state: StorefrontState,
    debouncer: SearchDebouncer,
}

impl Storefront {
    /// Create a storefront over `api`.
    ///
    /// # Arguments
    ///
    /// * `api` - Backend transport
    /// * `session` - Source of the current session token
    /// * `notifier` - Where visitor-facing messages go
    /// * `search_delay` - Quiet period before a typed search is sent
    ///
    /// Debounced searches run on the tokio runtime current at construction.
    #[must_use]
    pub fn new(
        api: Arc<dyn StorefrontApi>,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
        search_delay: Duration,
    ) -> Self {
        let state = StorefrontState::new();
        let catalog = CatalogFetcher::new(Arc::clone(&api), Arc::clone(&notifier));
        let carts = CartFetcher::new(api, session, Arc::clone(&notifier));
        let coordinator = CartCoordinator::new(carts.clone(), state.clone(), notifier);

        let debouncer = {
            let catalog = catalog.clone();
            let state = state.clone();
            SearchDebouncer::new(search_delay, move |query: String| {
                // Ticket is taken at dispatch so responses are ordered by
                // when their search was sent
                let ticket = state.begin_catalog_request();
                let catalog = catalog.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    let products = catalog.fetch_filtered(&query).await;
                    state.finish_catalog_request(ticket, products);
                });
            })
        };

        Self {
            inner: Arc::new(StorefrontInner {
                catalog,
                carts,
                coordinator,
                state,
                debouncer,
            }),
        }
    }

    /// Create a storefront talking HTTP to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(
        config: &StorefrontConfig,
        session: Arc<dyn SessionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> std::result::Result<Self, ApiError> {
        let api = HttpStorefrontApi::new(config.endpoint.clone(), config.request_timeout)?;
        Ok(Self::new(
            Arc::new(api),
            session,
            notifier,
            config.search_debounce,
        ))
    }

    /// Load the catalog and the signed-in user's cart concurrently.
    #[instrument(skip(self))]
    pub async fn load(&self) {
        tokio::join!(self.load_catalog(), self.refresh_cart());
    }

    /// Replace the catalog with the full product list.
    pub async fn load_catalog(&self) {
        let ticket = self.inner.state.begin_catalog_request();
        let products = self.inner.catalog.fetch_all().await;
        self.inner.state.finish_catalog_request(ticket, products);
    }

    /// Re-fetch the cart. A failed or anonymous fetch keeps the cached cart.
    pub async fn refresh_cart(&self) {
        if let Some(entries) = self.inner.carts.fetch_current().await {
            self.inner.state.replace_cart(entries);
        }
    }

    /// Record search box input; the search runs once typing settles.
    ///
    /// May be called from any thread. Searches run on the runtime that was
    /// current when the storefront was created; if there was none and the
    /// caller is not inside one either, the input is dropped with a warning.
    pub fn search_input(&self, text: impl Into<String>) {
        self.inner.debouncer.on_input(text);
    }

    /// Search immediately, dropping any pending debounced search.
    #[instrument(skip(self))]
    pub async fn search_now(&self, query: &str) {
        self.inner.debouncer.cancel();
        let ticket = self.inner.state.begin_catalog_request();
        let products = self.inner.catalog.fetch_filtered(query).await;
        if !self.inner.state.finish_catalog_request(ticket, products) {
            debug!("Search superseded by a newer request");
        }
    }

    /// Add one unit of `product_id` from a product card.
    ///
    /// # Errors
    ///
    /// Returns why the cart was not changed; the visitor has already been
    /// notified.
    pub async fn add_to_cart(&self, product_id: &ProductId) -> Result<Vec<CartEntry>> {
        self.mutate(product_id, 1, AddOptions::ADD_TO_CART).await
    }

    /// Set the quantity of `product_id`; `0` removes it.
    ///
    /// # Errors
    ///
    /// Returns why the cart was not changed; the visitor has already been
    /// notified.
    pub async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Vec<CartEntry>> {
        self.mutate(product_id, quantity, AddOptions::QUANTITY_CONTROL)
            .await
    }

    /// Add one more unit of a product already in the cart.
    ///
    /// The current quantity is read from the cached server cart, which also
    /// holds entries the current catalog hides.
    ///
    /// # Errors
    ///
    /// [`StorefrontError::NotInCart`] without a request when the cached cart
    /// does not hold `product_id`; otherwise see [`Storefront::set_quantity`].
    pub async fn increment(&self, product_id: &ProductId) -> Result<Vec<CartEntry>> {
        let quantity = self.cart_quantity_of(product_id)?;
        self.set_quantity(product_id, quantity.saturating_add(1))
            .await
    }

    /// Remove one unit of a product in the cart, removing the entry at zero.
    ///
    /// # Errors
    ///
    /// See [`Storefront::increment`].
    pub async fn decrement(&self, product_id: &ProductId) -> Result<Vec<CartEntry>> {
        let quantity = self.cart_quantity_of(product_id)?;
        self.set_quantity(product_id, quantity.saturating_sub(1))
            .await
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StorefrontView> {
        self.inner.state.subscribe()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn view(&self) -> StorefrontView {
        self.inner.state.view()
    }

    async fn mutate(
        &self,
        product_id: &ProductId,
        quantity: u32,
        options: AddOptions,
    ) -> Result<Vec<CartEntry>> {
        let token = self.inner.carts.session_token();
        let items = self.inner.state.view().line_items;
        self.inner
            .coordinator
            .add_or_update(token.as_ref(), &items, product_id, quantity, options)
            .await
    }

    fn cart_quantity_of(&self, product_id: &ProductId) -> Result<u32> {
        if self.inner.carts.session_token().is_none() {
            return self.inner.coordinator.reject(StorefrontError::AuthRequired);
        }

        let quantity = self
            .inner
            .state
            .view()
            .cart
            .iter()
            .find(|entry| &entry.product_id == product_id)
            .map(|entry| entry.quantity.get());

        match quantity {
            Some(quantity) => Ok(quantity),
            None => self
                .inner
                .coordinator
                .reject(StorefrontError::NotInCart(product_id.clone())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    use super::*;
    use crate::notify::{ChannelNotifier, Notification, messages};
    use crate::search::DEFAULT_SEARCH_DELAY;
    use crate::session::MemoryCredentialStore;
    use crate::testing::{Call, FakeApi, entry, product};

    fn storefront(
        api: &Arc<FakeApi>,
        token: Option<&str>,
    ) -> (Storefront, UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::channel();
        let store = token.map_or_else(MemoryCredentialStore::new, MemoryCredentialStore::with_token);
        let dyn_api: Arc<dyn StorefrontApi> = api.clone();
        let storefront = Storefront::new(
            dyn_api,
            Arc::new(store),
            Arc::new(notifier),
            DEFAULT_SEARCH_DELAY,
        );
        (storefront, rx)
    }

    fn shop() -> Arc<FakeApi> {
        Arc::new(FakeApi::with_catalog(vec![
            product("A", "Widget", 10),
            product("B", "Gadget", 20),
        ]))
    }

    #[tokio::test]
    async fn test_load_joins_cart_with_catalog() {
        let api = shop();
        api.set_cart("tok", vec![entry("A", 1)]);
        let (sf, _rx) = storefront(&api, Some("tok"));

        sf.load().await;

        let view = sf.view();
        assert_eq!(view.catalog.len(), 2);
        assert!(!view.loading);
        assert_eq!(view.line_items.len(), 1);
        let item = &view.line_items[0];
        assert_eq!(item.product_id.as_str(), "A");
        assert_eq!(item.name, "Widget");
        assert_eq!(item.unit_cost, Decimal::from(10));
        assert_eq!(item.quantity.get(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_load_skips_cart() {
        let api = shop();
        let (sf, mut rx) = storefront(&api, None);

        sf.load().await;

        assert_eq!(api.calls(), vec![Call::ListProducts]);
        assert!(sf.view().line_items.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_catalog_failure_empties_catalog() {
        let api = shop();
        let (sf, mut rx) = storefront(&api, None);
        sf.load_catalog().await;
        assert_eq!(sf.view().catalog.len(), 2);

        api.fail_catalog(500);
        sf.load_catalog().await;

        let view = sf.view();
        assert!(view.is_catalog_empty());
        assert!(!view.loading);
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::error(messages::CATALOG_LOAD_FAILED)
        );
    }

    #[tokio::test]
    async fn test_add_then_duplicate_is_refused() {
        let api = shop();
        let (sf, mut rx) = storefront(&api, Some("tok"));
        sf.load().await;

        sf.add_to_cart(&ProductId::new("B")).await.unwrap();
        assert_eq!(sf.view().cart_quantity(), 1);

        let err = sf.add_to_cart(&ProductId::new("B")).await.unwrap_err();
        assert!(matches!(err, StorefrontError::DuplicateRejected(_)));
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::warning(messages::ALREADY_IN_CART)
        );
        // one GET from load, one POST from the first add
        assert_eq!(api.cart_calls(), 2);
    }

    #[tokio::test]
    async fn test_anonymous_add_requires_login() {
        let api = shop();
        let (sf, mut rx) = storefront(&api, None);
        sf.load().await;

        let err = sf.add_to_cart(&ProductId::new("A")).await.unwrap_err();

        assert!(matches!(err, StorefrontError::AuthRequired));
        assert_eq!(api.cart_calls(), 0);
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::error(messages::LOGIN_REQUIRED)
        );
    }

    #[tokio::test]
    async fn test_quantity_controls() {
        let api = shop();
        api.set_cart("tok", vec![entry("A", 1)]);
        let (sf, _rx) = storefront(&api, Some("tok"));
        sf.load().await;

        sf.increment(&ProductId::new("A")).await.unwrap();
        assert_eq!(sf.view().cart, vec![entry("A", 2)]);
        assert_eq!(sf.view().cart_total(), Decimal::from(20));

        sf.decrement(&ProductId::new("A")).await.unwrap();
        assert_eq!(sf.view().cart, vec![entry("A", 1)]);

        sf.decrement(&ProductId::new("A")).await.unwrap();
        let view = sf.view();
        assert!(view.cart.is_empty());
        assert!(view.line_items.is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes() {
        let api = shop();
        api.set_cart("tok", vec![entry("A", 3), entry("B", 1)]);
        let (sf, _rx) = storefront(&api, Some("tok"));
        sf.load().await;

        sf.set_quantity(&ProductId::new("A"), 0).await.unwrap();

        let ids: Vec<_> = sf
            .view()
            .line_items
            .iter()
            .map(|i| i.product_id.to_string())
            .collect();
        assert_eq!(ids, ["B"]);
    }

    #[tokio::test]
    async fn test_search_without_matches_empties_view() {
        let api = shop();
        api.set_cart("tok", vec![entry("A", 1)]);
        let (sf, mut rx) = storefront(&api, Some("tok"));
        sf.load().await;

        sf.search_now("zzz-nomatch").await;

        let view = sf.view();
        assert!(view.is_catalog_empty());
        assert!(view.line_items.is_empty());
        assert_eq!(view.cart, vec![entry("A", 1)]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cart_refresh_failure_keeps_cart() {
        let api = shop();
        api.set_cart("tok", vec![entry("A", 1)]);
        let (sf, mut rx) = storefront(&api, Some("tok"));
        sf.load().await;

        api.fail_cart(400, Some("Protected route, Oauth2 Bearer token not found"));
        sf.refresh_cart().await;

        assert_eq!(sf.view().cart, vec![entry("A", 1)]);
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::error("Protected route, Oauth2 Bearer token not found")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search_sends_last_text() {
        let api = shop();
        let (sf, _rx) = storefront(&api, None);

        sf.search_input("g");
        sleep(Duration::from_millis(100)).await;
        sf.search_input("ga");
        sleep(Duration::from_millis(100)).await;
        sf.search_input("gad");
        sleep(Duration::from_secs(1)).await;

        assert_eq!(api.search_queries(), ["gad"]);
        let view = sf.view();
        assert_eq!(view.catalog.len(), 1);
        assert_eq!(view.catalog[0].name, "Gadget");
        assert!(!view.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stale_search_cannot_overwrite_newer_result() {
        let api = shop();
        api.delay_search("wid", Duration::from_secs(2));
        let (sf, _rx) = storefront(&api, None);

        // "wid" dispatches at 500ms and answers at 2500ms
        sf.search_input("wid");
        sleep(Duration::from_millis(600)).await;
        // "gad" dispatches at 1100ms and answers at once
        sf.search_input("gad");
        sleep(Duration::from_secs(3)).await;

        assert_eq!(api.search_queries(), ["wid", "gad"]);
        let view = sf.view();
        assert_eq!(view.catalog.len(), 1);
        assert_eq!(view.catalog[0].name, "Gadget");
        assert!(!view.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_now_cancels_pending_input() {
        let api = shop();
        let (sf, _rx) = storefront(&api, None);

        sf.search_input("wid");
        sf.search_now("gad").await;
        sleep(Duration::from_secs(1)).await;

        assert_eq!(api.search_queries(), ["gad"]);
        assert_eq!(sf.view().catalog[0].name, "Gadget");
    }

    #[tokio::test]
    async fn test_subscribers_observe_load() {
        let api = shop();
        let (sf, _rx) = storefront(&api, None);
        let mut rx = sf.subscribe();

        sf.load_catalog().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().catalog.len(), 2);
    }

    #[tokio::test]
    async fn test_decrement_uses_cart_hidden_by_search() {
        let api = shop();
        api.set_cart("tok", vec![entry("A", 5), entry("B", 1)]);
        let (sf, _rx) = storefront(&api, Some("tok"));
        sf.load().await;
        sf.search_now("gad").await;
        assert_eq!(sf.view().line_items.len(), 1);

        sf.decrement(&ProductId::new("A")).await.unwrap();

        assert_eq!(sf.view().cart, vec![entry("A", 4), entry("B", 1)]);
    }

    #[tokio::test]
    async fn test_increment_uses_cart_hidden_by_search() {
        let api = shop();
        api.set_cart("tok", vec![entry("A", 5), entry("B", 1)]);
        let (sf, _rx) = storefront(&api, Some("tok"));
        sf.load().await;
        sf.search_now("gad").await;

        sf.increment(&ProductId::new("A")).await.unwrap();

        assert_eq!(sf.view().cart, vec![entry("A", 6), entry("B", 1)]);
    }

    #[tokio::test]
    async fn test_quantity_control_for_absent_product_is_refused() {
        let api = shop();
        api.set_cart("tok", vec![entry("B", 1)]);
        let (sf, mut rx) = storefront(&api, Some("tok"));
        sf.load().await;
        let calls_before = api.cart_calls();

        let err = sf.decrement(&ProductId::new("A")).await.unwrap_err();
        assert!(matches!(err, StorefrontError::NotInCart(_)));
        let err = sf.increment(&ProductId::new("A")).await.unwrap_err();
        assert!(matches!(err, StorefrontError::NotInCart(_)));

        assert_eq!(api.cart_calls(), calls_before);
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::warning(messages::NOT_IN_CART)
        );
        assert_eq!(sf.view().cart, vec![entry("B", 1)]);
    }

    #[tokio::test]
    async fn test_anonymous_quantity_control_requires_login() {
        let api = shop();
        let (sf, mut rx) = storefront(&api, None);

        let err = sf.increment(&ProductId::new("A")).await.unwrap_err();

        assert!(matches!(err, StorefrontError::AuthRequired));
        assert_eq!(api.cart_calls(), 0);
        assert_eq!(
            rx.try_recv().unwrap(),
            Notification::error(messages::LOGIN_REQUIRED)
        );
    }

    #[test]
    fn test_search_input_from_non_runtime_thread() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let api = shop();
        let (sf, _rx) = runtime.block_on(async {
            let (notifier, rx) = ChannelNotifier::channel();
            let dyn_api: Arc<dyn StorefrontApi> = api.clone();
            let sf = Storefront::new(
                dyn_api,
                Arc::new(MemoryCredentialStore::new()),
                Arc::new(notifier),
                Duration::from_millis(10),
            );
            (sf, rx)
        });

        sf.search_input("gad");
        runtime.block_on(async { sleep(Duration::from_millis(200)).await });

        assert_eq!(api.search_queries(), ["gad"]);
        assert_eq!(sf.view().catalog[0].name, "Gadget");
    }
}
