//! In-memory backend for unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use qkart_core::{CartEntry, Product, ProductId, Rating};
use rust_decimal::Decimal;

use crate::api::{ApiError, StorefrontApi};
use crate::session::SessionToken;

/// A backend request as observed by [`FakeApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListProducts,
    Search(String),
    GetCart,
    UpdateCart { product_id: String, quantity: u32 },
}

#[derive(Default)]
struct FakeState {
    catalog: Vec<Product>,
    carts: HashMap<String, Vec<CartEntry>>,
    catalog_failure: Option<u16>,
    cart_failure: Option<(u16, Option<String>)>,
    search_delays: HashMap<String, Duration>,
    calls: Vec<Call>,
}

/// Backend double that serves a fixed catalog and per-token carts.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn with_catalog(catalog: Vec<Product>) -> Self {
        let api = Self::default();
        api.state.lock().unwrap().catalog = catalog;
        api
    }

    pub fn set_cart(&self, token: &str, entries: Vec<CartEntry>) {
        self.state
            .lock()
            .unwrap()
            .carts
            .insert(token.to_string(), entries);
    }

    pub fn fail_catalog(&self, status: u16) {
        self.state.lock().unwrap().catalog_failure = Some(status);
    }

    pub fn fail_cart(&self, status: u16, message: Option<&str>) {
        self.state.lock().unwrap().cart_failure = Some((status, message.map(str::to_string)));
    }

    pub fn delay_search(&self, query: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .search_delays
            .insert(query.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Search(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub fn cart_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::GetCart | Call::UpdateCart { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn catalog_result(&self) -> Result<Vec<Product>, ApiError> {
        let state = self.state.lock().unwrap();
        match state.catalog_failure {
            Some(status) => Err(ApiError::Status {
                status,
                message: None,
            }),
            None => Ok(state.catalog.clone()),
        }
    }

    fn cart_failure(&self) -> Option<ApiError> {
        self.state
            .lock()
            .unwrap()
            .cart_failure
            .clone()
            .map(|(status, message)| ApiError::Status { status, message })
    }
}

#[async_trait]
impl StorefrontApi for FakeApi {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        self.record(Call::ListProducts);
        self.catalog_result()
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError> {
        self.record(Call::Search(query.to_string()));

        let delay = self.state.lock().unwrap().search_delays.get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let needle = query.to_lowercase();
        let matches: Vec<Product> = self
            .catalog_result()?
            .into_iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.category.to_lowercase().contains(&needle)
            })
            .collect();

        if matches.is_empty() {
            return Err(ApiError::Status {
                status: 404,
                message: Some("No products found".to_string()),
            });
        }
        Ok(matches)
    }

    async fn get_cart(&self, token: &SessionToken) -> Result<Vec<CartEntry>, ApiError> {
        self.record(Call::GetCart);
        if let Some(err) = self.cart_failure() {
            return Err(err);
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .carts
            .get(token.expose())
            .cloned()
            .unwrap_or_default())
    }

    async fn update_cart(
        &self,
        token: &SessionToken,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Vec<CartEntry>, ApiError> {
        self.record(Call::UpdateCart {
            product_id: product_id.to_string(),
            quantity,
        });
        if let Some(err) = self.cart_failure() {
            return Err(err);
        }

        let mut state = self.state.lock().unwrap();
        if !state.catalog.iter().any(|p| &p.id == product_id) {
            return Err(ApiError::Status {
                status: 404,
                message: Some("Product doesn't exist".to_string()),
            });
        }

        let cart = state.carts.entry(token.expose().to_string()).or_default();
        match NonZeroU32::new(quantity) {
            None => cart.retain(|e| &e.product_id != product_id),
            Some(quantity) => match cart.iter_mut().find(|e| &e.product_id == product_id) {
                Some(existing) => existing.quantity = quantity,
                None => cart.push(CartEntry::new(product_id.clone(), quantity)),
            },
        }
        Ok(cart.clone())
    }
}

pub fn product(id: &str, name: &str, cost: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        category: "Electronics".to_string(),
        unit_cost: Decimal::from(cost),
        rating: Rating::new(4).unwrap(),
        image_url: format!("https://img.example/{id}.png"),
    }
}

pub fn entry(id: &str, qty: u32) -> CartEntry {
    CartEntry::new(ProductId::new(id), NonZeroU32::new(qty).unwrap())
}
