//! # In-Memory Backend
//!
//! A [`RequestTransport`] that plays the commerce backend inside the process.
//!
//! ## Behaviour
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    InMemoryBackend                                      │
//! │                                                                         │
//! │  cartCreate       → new cart "cart-A", "cart-B", ...                   │
//! │  cartLinesAdd     → same variant merges into one line                  │
//! │  cartLinesUpdate  → quantity 0 removes the line                        │
//! │  cartLinesRemove  → unknown line id is a user error                    │
//! │  cart (query)     → { cart: null } for unknown or expired carts        │
//! │                                                                         │
//! │  Totals are always recomputed from lines (USD).                        │
//! │                                                                         │
//! │  Test hooks                                                            │
//! │  ├── fail_next(Failure)   - next call fails, state untouched           │
//! │  ├── expire(cart_id)      - cart disappears from the backend           │
//! │  └── hold_responses()     - responses wait until released, in any      │
//! │                             order the caller chooses                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! State changes are applied when a call arrives; holding only delays the
//! moment the caller sees the response.
//!
//! This is test support: [`Failure`], [`RecordedCall`] and the inspection
//! methods exist for assertions, not for production wiring.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use storefront_core::{Cart, CartIdentifier, CartLine, Money, MoneyAmount};

use crate::error::{TransportError, TransportResult};
use crate::transport::{
    expect_kind, Document, ErrorRecord, OperationKind, RequestTransport, TransportResponse,
    UserErrorRecord, NOT_FOUND_CODE,
};

/// Currency every in-memory cart is priced in.
pub const MEMORY_CURRENCY: &str = "USD";

/// Unit price for variants that were never registered.
pub const DEFAULT_UNIT_PRICE: Money = Money::from_minor_units(1000);

const MISSING_CART_MESSAGE: &str = "The specified cart does not exist.";

// =============================================================================
// Test Hooks
// =============================================================================

/// A failure to inject into the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The request never completes (connection dropped).
    Transport,

    /// The backend answers with a request-level error.
    RequestError(String),

    /// The backend answers with a `NOT_FOUND` coded error.
    NotFound,

    /// The backend rejects the input with a user error.
    UserError(String),
}

/// A call as the backend received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub document: Document,
    pub variables: Value,
}

// =============================================================================
// Backend State
// =============================================================================

#[derive(Debug, Clone)]
struct CatalogEntry {
    title: String,
    price: Money,
    available_for_sale: bool,
    quantity_available: i64,
}

impl CatalogEntry {
    fn fallback(variant_id: &str) -> Self {
        CatalogEntry {
            title: variant_id.to_string(),
            price: DEFAULT_UNIT_PRICE,
            available_for_sale: true,
            quantity_available: 100,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredLine {
    id: String,
    variant_id: String,
    quantity: u32,
}

#[derive(Debug, Clone)]
struct StoredCart {
    id: String,
    lines: Vec<StoredLine>,
}

#[derive(Debug, Default)]
struct BackendState {
    carts: HashMap<String, StoredCart>,
    catalog: HashMap<String, CatalogEntry>,
    created: u32,
    next_line: u32,
    failures: VecDeque<Failure>,
    calls: Vec<RecordedCall>,
    holding: bool,
    gates: Vec<Option<oneshot::Sender<()>>>,
}

impl BackendState {
    fn next_cart_id(&mut self) -> String {
        let n = self.created;
        self.created += 1;
        if n < 26 {
            format!("cart-{}", char::from(b'A' + n as u8))
        } else {
            format!("cart-{}", n)
        }
    }

    fn next_line_id(&mut self) -> String {
        self.next_line += 1;
        format!("line-{}", self.next_line)
    }

    fn entry(&self, variant_id: &str) -> CatalogEntry {
        self.catalog
            .get(variant_id)
            .cloned()
            .unwrap_or_else(|| CatalogEntry::fallback(variant_id))
    }

    fn snapshot(&self, stored: &StoredCart) -> TransportResult<Cart> {
        let mut total_quantity = 0u32;
        let mut total_minor = 0i64;
        let mut lines = Vec::with_capacity(stored.lines.len());

        for line in &stored.lines {
            let entry = self.entry(&line.variant_id);
            let line_minor = entry.price.minor_units() * i64::from(line.quantity);
            total_quantity += line.quantity;
            total_minor += line_minor;

            lines.push(CartLine {
                id: line.id.clone(),
                variant_id: line.variant_id.clone(),
                title: entry.title,
                unit_price: MoneyAmount::new(entry.price, MEMORY_CURRENCY),
                line_total: MoneyAmount::new(
                    Money::from_minor_units(line_minor),
                    MEMORY_CURRENCY,
                ),
                quantity: line.quantity,
                available_for_sale: entry.available_for_sale,
                quantity_available: entry.quantity_available,
            });
        }

        Ok(Cart {
            id: CartIdentifier::new(stored.id.clone())
                .map_err(|e| TransportError::Decode(e.to_string()))?,
            total_quantity,
            total_amount: MoneyAmount::new(Money::from_minor_units(total_minor), MEMORY_CURRENCY),
            checkout_url: format!("https://shop.example/cart/c/{}", stored.id),
            lines,
        })
    }

    fn respond(&self, cart_id: &str) -> TransportResult<TransportResponse> {
        match self.carts.get(cart_id) {
            Some(stored) => TransportResponse::with_cart(&self.snapshot(stored)?),
            None => Ok(TransportResponse::cart_missing()),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    fn execute(&mut self, document: Document, variables: &Value) -> TransportResult<TransportResponse> {
        match document {
            Document::CartQuery => self.respond(str_field(variables, "cartId")?),
            Document::CartCreate => {
                let lines = variables
                    .get("input")
                    .ok_or_else(|| TransportError::Decode("missing input".into()))?;
                let requested = requested_lines(lines, "merchandiseId")?;
                if let Some(rejection) = self.reject_unsellable(&requested) {
                    return Ok(rejection);
                }

                let id = self.next_cart_id();
                let mut cart = StoredCart {
                    id: id.clone(),
                    lines: Vec::new(),
                };
                for (variant_id, quantity) in requested {
                    self.merge_line(&mut cart, variant_id, quantity);
                }
                self.carts.insert(id.clone(), cart);
                self.respond(&id)
            }
            Document::CartLinesAdd => {
                let cart_id = str_field(variables, "cartId")?;
                let requested = requested_lines(variables, "merchandiseId")?;
                if let Some(rejection) = self.reject_unsellable(&requested) {
                    return Ok(rejection);
                }

                let Some(mut cart) = self.carts.remove(cart_id) else {
                    return Ok(user_error(MISSING_CART_MESSAGE));
                };
                for (variant_id, quantity) in requested {
                    self.merge_line(&mut cart, variant_id, quantity);
                }
                self.carts.insert(cart_id.to_string(), cart);
                self.respond(cart_id)
            }
            Document::CartLinesUpdate => {
                let cart_id = str_field(variables, "cartId")?;
                let requested = requested_lines(variables, "id")?;
                let Some(cart) = self.carts.get_mut(cart_id) else {
                    return Ok(user_error(MISSING_CART_MESSAGE));
                };

                for (line_id, _) in &requested {
                    if !cart.lines.iter().any(|l| l.id == *line_id) {
                        return Ok(unknown_line(line_id));
                    }
                }
                for (line_id, quantity) in requested {
                    if quantity == 0 {
                        cart.lines.retain(|l| l.id != line_id);
                    } else if let Some(line) = cart.lines.iter_mut().find(|l| l.id == line_id) {
                        line.quantity = quantity;
                    }
                }
                self.respond(cart_id)
            }
            Document::CartLinesRemove => {
                let cart_id = str_field(variables, "cartId")?;
                let line_ids = variables
                    .get("lineIds")
                    .and_then(Value::as_array)
                    .ok_or_else(|| TransportError::Decode("missing lineIds".into()))?
                    .iter()
                    .map(|v| {
                        v.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| TransportError::Decode("line id must be a string".into()))
                    })
                    .collect::<TransportResult<Vec<_>>>()?;

                let Some(cart) = self.carts.get_mut(cart_id) else {
                    return Ok(user_error(MISSING_CART_MESSAGE));
                };
                if let Some(line_id) = line_ids
                    .iter()
                    .find(|id| !cart.lines.iter().any(|l| l.id == **id))
                {
                    return Ok(unknown_line(line_id));
                }
                cart.lines.retain(|l| !line_ids.contains(&l.id));
                self.respond(cart_id)
            }
        }
    }

    fn merge_line(&mut self, cart: &mut StoredCart, variant_id: String, quantity: u32) {
        if let Some(line) = cart.lines.iter_mut().find(|l| l.variant_id == variant_id) {
            line.quantity += quantity;
            return;
        }
        let id = self.next_line_id();
        cart.lines.push(StoredLine {
            id,
            variant_id,
            quantity,
        });
    }

    fn reject_unsellable(&self, requested: &[(String, u32)]) -> Option<TransportResponse> {
        requested.iter().find_map(|(variant_id, _)| {
            let entry = self.entry(variant_id);
            (!entry.available_for_sale)
                .then(|| user_error(&format!("{} is sold out.", entry.title)))
        })
    }
}

fn str_field<'a>(variables: &'a Value, key: &str) -> TransportResult<&'a str> {
    variables
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TransportError::Decode(format!("missing {}", key)))
}

/// Reads `lines: [{ <id_key>, quantity }]`.
fn requested_lines(variables: &Value, id_key: &str) -> TransportResult<Vec<(String, u32)>> {
    variables
        .get("lines")
        .and_then(Value::as_array)
        .ok_or_else(|| TransportError::Decode("missing lines".into()))?
        .iter()
        .map(|line| {
            let id = str_field(line, id_key)?.to_string();
            let quantity = line
                .get("quantity")
                .and_then(Value::as_u64)
                .and_then(|q| u32::try_from(q).ok())
                .ok_or_else(|| TransportError::Decode("invalid quantity".into()))?;
            Ok((id, quantity))
        })
        .collect()
}

fn user_error(message: &str) -> TransportResponse {
    TransportResponse {
        user_errors: vec![UserErrorRecord::new(message)],
        ..TransportResponse::cart_missing()
    }
}

fn unknown_line(line_id: &str) -> TransportResponse {
    user_error(&format!(
        "The merchandise line with id {} does not exist.",
        line_id
    ))
}

fn injected(failure: Failure) -> TransportResult<TransportResponse> {
    match failure {
        Failure::Transport => Err(TransportError::Http("injected connection failure".into())),
        Failure::RequestError(message) => Ok(TransportResponse {
            errors: vec![ErrorRecord::new(message)],
            ..Default::default()
        }),
        Failure::NotFound => Ok(TransportResponse {
            errors: vec![ErrorRecord::new("Cart not found").with_code(NOT_FOUND_CODE)],
            ..Default::default()
        }),
        Failure::UserError(message) => Ok(user_error(&message)),
    }
}

// =============================================================================
// Backend
// =============================================================================

/// In-process commerce backend.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a purchasable variant.
    pub fn with_variant(self, variant_id: &str, title: &str, price: Money) -> Self {
        self.state().catalog.insert(
            variant_id.to_string(),
            CatalogEntry {
                title: title.to_string(),
                price,
                available_for_sale: true,
                quantity_available: 100,
            },
        );
        self
    }

    /// Registers a variant that cannot be added to a cart.
    pub fn with_sold_out_variant(self, variant_id: &str, title: &str) -> Self {
        self.state().catalog.insert(
            variant_id.to_string(),
            CatalogEntry {
                title: title.to_string(),
                price: DEFAULT_UNIT_PRICE,
                available_for_sale: false,
                quantity_available: 0,
            },
        );
        self
    }

    /// Queues a failure for the next call.
    pub fn fail_next(&self, failure: Failure) {
        self.state().failures.push_back(failure);
    }

    /// Deletes a cart, as the backend does when a cart ages out.
    pub fn expire(&self, cart_id: &str) {
        self.state().carts.remove(cart_id);
    }

    /// Current backend view of a cart.
    pub fn cart(&self, cart_id: &str) -> Option<Cart> {
        let state = self.state();
        let stored = state.carts.get(cart_id)?;
        state.snapshot(stored).ok()
    }

    /// Number of live carts.
    pub fn cart_count(&self) -> usize {
        self.state().carts.len()
    }

    /// Every call received, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    /// Number of calls received for one document.
    pub fn calls_to(&self, document: Document) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.document == document)
            .count()
    }

    // =========================================================================
    // Response Gating
    // =========================================================================

    /// Makes every subsequent response wait for [`release`](Self::release).
    pub fn hold_responses(&self) {
        self.state().holding = true;
    }

    /// Number of held responses not yet released.
    pub fn pending_responses(&self) -> usize {
        self.state().gates.iter().filter(|g| g.is_some()).count()
    }

    /// Releases the held response of the `index`-th held call (0-based, in
    /// arrival order). Releasing twice is a no-op.
    pub fn release(&self, index: usize) {
        if let Some(gate) = self.state().gates.get_mut(index).and_then(Option::take) {
            let _ = gate.send(());
        }
    }

    /// Stops holding and releases everything still held.
    pub fn resume(&self) {
        let mut state = self.state();
        state.holding = false;
        for gate in state.gates.iter_mut().filter_map(Option::take) {
            let _ = gate.send(());
        }
    }

    async fn handle(
        &self,
        document: Document,
        variables: Value,
        kind: OperationKind,
    ) -> TransportResult<TransportResponse> {
        expect_kind(document, kind)?;

        let (response, gate) = {
            let mut state = self.state();
            debug!(%document, "In-memory backend call");
            state.calls.push(RecordedCall {
                document,
                variables: variables.clone(),
            });

            let response = match state.failures.pop_front() {
                Some(failure) => injected(failure),
                None => state.execute(document, &variables),
            };

            let gate = if state.holding {
                let (tx, rx) = oneshot::channel();
                state.gates.push(Some(tx));
                Some(rx)
            } else {
                None
            };
            (response, gate)
        };

        if let Some(gate) = gate {
            let _ = gate.await;
        }
        response
    }
}

#[async_trait]
impl RequestTransport for InMemoryBackend {
    async fn query(&self, document: Document, variables: Value) -> TransportResult<TransportResponse> {
        self.handle(document, variables, OperationKind::Query).await
    }

    async fn mutate(&self, document: Document, variables: Value) -> TransportResult<TransportResponse> {
        self.handle(document, variables, OperationKind::Mutation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn create(backend: &InMemoryBackend, variant: &str, quantity: u32) -> Cart {
        backend
            .mutate(
                Document::CartCreate,
                json!({ "input": { "lines": [{ "merchandiseId": variant, "quantity": quantity }] } }),
            )
            .await
            .unwrap()
            .cart()
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let backend = InMemoryBackend::new();
        assert_eq!(create(&backend, "v1", 1).await.id.as_str(), "cart-A");
        assert_eq!(create(&backend, "v1", 1).await.id.as_str(), "cart-B");
        assert_eq!(backend.cart_count(), 2);
    }

    #[tokio::test]
    async fn test_totals_follow_catalog_prices() {
        let backend = InMemoryBackend::new().with_variant(
            "variant-shirt",
            "Shirt",
            Money::from_minor_units(2550),
        );

        let cart = create(&backend, "variant-shirt", 2).await;
        assert_eq!(cart.total_quantity, 2);
        assert_eq!(cart.total_amount.to_string(), "51.00 USD");
        assert_eq!(cart.lines[0].title, "Shirt");
        assert_eq!(cart.lines[0].line_total.amount.minor_units(), 5100);

        let response = backend
            .mutate(
                Document::CartLinesAdd,
                json!({ "cartId": "cart-A", "lines": [{ "merchandiseId": "other", "quantity": 1 }] }),
            )
            .await
            .unwrap();
        let cart = response.cart().unwrap().unwrap();
        assert_eq!(cart.total_amount.amount, Money::from_minor_units(6100));
    }

    #[tokio::test]
    async fn test_adding_same_variant_merges_lines() {
        let backend = InMemoryBackend::new();
        create(&backend, "v1", 1).await;

        let response = backend
            .mutate(
                Document::CartLinesAdd,
                json!({ "cartId": "cart-A", "lines": [{ "merchandiseId": "v1", "quantity": 2 }] }),
            )
            .await
            .unwrap();

        let cart = response.cart().unwrap().unwrap();
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.total_quantity, 3);
    }

    #[tokio::test]
    async fn test_unknown_cart_and_line() {
        let backend = InMemoryBackend::new();

        let query = backend
            .query(Document::CartQuery, json!({ "cartId": "cart-Q" }))
            .await
            .unwrap();
        assert!(query.is_not_found());

        let update = backend
            .mutate(
                Document::CartLinesUpdate,
                json!({ "cartId": "cart-Q", "lines": [{ "id": "line-1", "quantity": 1 }] }),
            )
            .await
            .unwrap();
        assert_eq!(update.first_user_error(), Some(MISSING_CART_MESSAGE));

        create(&backend, "v1", 1).await;
        let remove = backend
            .mutate(
                Document::CartLinesRemove,
                json!({ "cartId": "cart-A", "lineIds": ["line-99"] }),
            )
            .await
            .unwrap();
        assert!(remove.first_user_error().unwrap().contains("line-99"));
        assert_eq!(backend.cart("cart-A").unwrap().total_quantity, 1);
    }

    #[tokio::test]
    async fn test_sold_out_variant_is_rejected() {
        let backend = InMemoryBackend::new().with_sold_out_variant("v-gone", "Poster");

        let response = backend
            .mutate(
                Document::CartCreate,
                json!({ "input": { "lines": [{ "merchandiseId": "v-gone", "quantity": 1 }] } }),
            )
            .await
            .unwrap();

        assert_eq!(response.first_user_error(), Some("Poster is sold out."));
        assert_eq!(backend.cart_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures_leave_state_alone() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Failure::Transport);

        let result = backend
            .mutate(
                Document::CartCreate,
                json!({ "input": { "lines": [{ "merchandiseId": "v1", "quantity": 1 }] } }),
            )
            .await;

        assert!(matches!(result, Err(TransportError::Http(_))));
        assert_eq!(backend.cart_count(), 0);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_wrong_entry_point_is_rejected() {
        let backend = InMemoryBackend::new();
        let result = backend.query(Document::CartCreate, json!({})).await;
        assert!(matches!(result, Err(TransportError::Unsupported(_))));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_held_responses_release_out_of_order() {
        let backend = std::sync::Arc::new(InMemoryBackend::new());
        backend.hold_responses();

        let first = {
            let backend = backend.clone();
            tokio::spawn(async move { create(&backend, "v1", 1).await })
        };
        while backend.pending_responses() < 1 {
            tokio::task::yield_now().await;
        }
        let second = {
            let backend = backend.clone();
            tokio::spawn(async move { create(&backend, "v2", 1).await })
        };
        while backend.pending_responses() < 2 {
            tokio::task::yield_now().await;
        }

        backend.release(1);
        assert_eq!(second.await.unwrap().id.as_str(), "cart-B");
        assert_eq!(backend.pending_responses(), 1);

        backend.resume();
        assert_eq!(first.await.unwrap().id.as_str(), "cart-A");
    }
}
