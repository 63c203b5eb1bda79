//! Integration tests for the QKart storefront.
//!
//! The tests drive the real HTTP client against [`FakeBackend`], an axum
//! server bound to an ephemeral localhost port that speaks the backend's
//! catalog and cart API.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p qkart-integration-tests
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;

/// Message the backend sends for a cart request without a bearer token.
pub const MISSING_TOKEN_MESSAGE: &str = "Protected route, Oauth2 Bearer token not found";

/// Message the backend sends when a cart update names an unknown product.
pub const UNKNOWN_PRODUCT_MESSAGE: &str = "Product doesn't exist";

/// A request as seen by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct BackendState {
    products: Vec<Value>,
    carts: HashMap<String, Vec<(String, u32)>>,
    products_failure: Option<u16>,
    cart_failure: Option<(u16, String)>,
    search_delays: HashMap<String, Duration>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<BackendState>>;

fn lock(state: &Shared) -> MutexGuard<'_, BackendState> {
    state.lock().expect("fake backend state poisoned")
}

/// In-process stand-in for the storefront backend.
///
/// Routes are served under `/api/v1` so that endpoint path handling is
/// exercised.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Shared,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Bind to `127.0.0.1:0` and start serving.
    pub async fn start() -> Self {
        let state = Shared::default();

        let api = Router::new()
            .route("/products", get(list_products))
            .route("/products/search", get(search_products))
            .route("/cart", get(get_cart).post(update_cart));

        let app = Router::new()
            .nest("/api/v1", api)
            .layer(middleware::from_fn_with_state(state.clone(), record))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Failed to read local address");

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Fake backend stopped");
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL the storefront should be configured with.
    #[must_use]
    pub fn endpoint(&self) -> Url {
        Url::parse(&format!("http://{}/api/v1", self.addr)).expect("Invalid endpoint URL")
    }

    /// Add a product to the catalog.
    pub fn add_product(&self, id: &str, name: &str, category: &str, cost: u32, rating: u8) {
        lock(&self.state).products.push(json!({
            "_id": id,
            "name": name,
            "category": category,
            "cost": cost,
            "rating": rating,
            "image": format!("https://img.example/{id}.png"),
        }));
    }

    /// Replace the cart held for `token`.
    pub fn set_cart(&self, token: &str, entries: &[(&str, u32)]) {
        let entries = entries
            .iter()
            .map(|(id, qty)| ((*id).to_string(), *qty))
            .collect();
        lock(&self.state).carts.insert(token.to_string(), entries);
    }

    /// Cart currently held for `token`.
    #[must_use]
    pub fn cart(&self, token: &str) -> Vec<(String, u32)> {
        lock(&self.state)
            .carts
            .get(token)
            .cloned()
            .unwrap_or_default()
    }

    /// Fail catalog and search requests with `status` and no body.
    pub fn fail_products(&self, status: u16) {
        lock(&self.state).products_failure = Some(status);
    }

    /// Fail cart requests with `status` and a `{success: false, message}` body.
    pub fn fail_cart(&self, status: u16, message: &str) {
        lock(&self.state).cart_failure = Some((status, message.to_string()));
    }

    /// Delay searches for exactly `query`.
    pub fn delay_search(&self, query: &str, delay: Duration) {
        lock(&self.state)
            .search_delays
            .insert(query.to_string(), delay);
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state).requests.clone()
    }

    /// Requests received for `method` and `path` (relative to `/api/v1`).
    #[must_use]
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        let full_path = format!("/api/v1{path}");
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == full_path)
            .collect()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        authorization: request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    lock(&state).requests.push(recorded);
    next.run(request).await
}

fn failure(status: u16, message: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

fn bare_status(status: u16) -> Response {
    StatusCode::from_u16(status)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn cart_json(entries: &[(String, u32)]) -> Value {
    entries
        .iter()
        .map(|(id, qty)| json!({ "productId": id, "qty": qty }))
        .collect()
}

async fn list_products(State(state): State<Shared>) -> Response {
    let state = lock(&state);
    match state.products_failure {
        Some(status) => bare_status(status),
        None => Json(state.products.clone()).into_response(),
    }
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    value: String,
}

async fn search_products(
    State(state): State<Shared>,
    Query(params): Query<SearchParams>,
) -> Response {
    let delay = lock(&state).search_delays.get(&params.value).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let state = lock(&state);
    if let Some(status) = state.products_failure {
        return bare_status(status);
    }

    let needle = params.value.to_lowercase();
    let matches: Vec<Value> = state
        .products
        .iter()
        .filter(|p| {
            ["name", "category"].iter().any(|field| {
                p[*field]
                    .as_str()
                    .is_some_and(|s| s.to_lowercase().contains(&needle))
            })
        })
        .cloned()
        .collect();

    if matches.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(matches).into_response()
}

async fn get_cart(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return failure(400, MISSING_TOKEN_MESSAGE);
    };

    let state = lock(&state);
    if let Some((status, message)) = &state.cart_failure {
        return failure(*status, message);
    }
    let cart = state.carts.get(&token).cloned().unwrap_or_default();
    Json(cart_json(&cart)).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartUpdate {
    product_id: String,
    qty: u32,
}

async fn update_cart(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(update): Json<CartUpdate>,
) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return failure(400, MISSING_TOKEN_MESSAGE);
    };

    let mut state = lock(&state);
    if let Some((status, message)) = &state.cart_failure {
        return failure(*status, message);
    }
    if !state
        .products
        .iter()
        .any(|p| p["_id"].as_str() == Some(update.product_id.as_str()))
    {
        return failure(404, UNKNOWN_PRODUCT_MESSAGE);
    }

    let cart = state.carts.entry(token).or_default();
    if update.qty == 0 {
        cart.retain(|(id, _)| *id != update.product_id);
    } else if let Some(existing) = cart.iter_mut().find(|(id, _)| *id == update.product_id) {
        existing.1 = update.qty;
    } else {
        cart.push((update.product_id, update.qty));
    }
    Json(cart_json(cart)).into_response()
}
