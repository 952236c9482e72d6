//! # Cart Synchronization Engine
//!
//! Keeps the locally cached cart consistent with the commerce backend.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Independent Axes                                 │
//! │                                                                         │
//! │  FETCH                                  ACTION                          │
//! │  ─────                                  ──────                          │
//! │  fetch_cart / refetch                   add / update / remove           │
//! │    is_loading = true                      action_error = None           │
//! │    │                                      action_loading = true         │
//! │    ├─ no id      → cart=None, error=None  │                             │
//! │    ├─ not found  → purge id, cart=None    ├─ Ok   → cart = snapshot     │
//! │    ├─ failure    → error="connection      │         publish CartChanged │
//! │    │               error", cart KEPT      │         track success        │
//! │    └─ ok         → cart = snapshot        └─ Err  → action_error = msg  │
//! │    is_loading = false                               cart KEPT           │
//! │                                                     track failure       │
//! │                                           action_loading = false        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Operations are plain async calls sharing one cart slot. Nothing is
//! queued, locked or cancelled: when two actions overlap, whichever
//! response resolves last overwrites the snapshot. Callers serialize by
//! disabling controls while `action_loading` is true.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use storefront_core::{Cart, CartIdentifier, CartState};

use crate::config::{StorefrontConfig, DEFAULT_CART_KEY};
use crate::error::{CartError, CartResult, ConfigError, CONNECTION_ERROR_MESSAGE};
use crate::http::HttpTransport;
use crate::signal::{CartChanged, SignalBus, DEFAULT_SIGNAL_CAPACITY};
use crate::store::{CartIdSlot, FileStore, KeyValueStore, MemoryStore};
use crate::telemetry::{NoOpTelemetry, Telemetry, TelemetryEvent, TracingTelemetry};
use crate::transport::{Document, RequestTransport, TransportResponse};

/// Quantity used by `add_to_cart` when none is given.
pub const DEFAULT_ADD_QUANTITY: u32 = 1;

/// Telemetry event for a successful add.
pub const ADD_TO_CART_EVENT: &str = "add_to_cart";

/// Telemetry event for a successful quantity update.
pub const UPDATE_CART_EVENT: &str = "update_cart";

/// Telemetry event for a successful line removal.
pub const REMOVE_FROM_CART_EVENT: &str = "remove_from_cart";

/// Telemetry event for any failed action.
pub const CART_ACTION_FAILED_EVENT: &str = "cart_action_failed";

// =============================================================================
// Actions
// =============================================================================

/// A mutating cart operation and its parameters.
#[derive(Debug, Clone)]
enum CartAction {
    Add { variant_id: String, quantity: u32 },
    Update { line_id: String, quantity: u32 },
    Remove { line_id: String },
}

impl CartAction {
    fn name(&self) -> &'static str {
        match self {
            CartAction::Add { .. } => ADD_TO_CART_EVENT,
            CartAction::Update { .. } => UPDATE_CART_EVENT,
            CartAction::Remove { .. } => REMOVE_FROM_CART_EVENT,
        }
    }

    /// Telemetry event pre-filled with the action's parameters.
    fn event(&self, name: &str) -> TelemetryEvent {
        let event = TelemetryEvent::new(name);
        match self {
            CartAction::Add {
                variant_id,
                quantity,
            } => event
                .with("variantId", variant_id.as_str())
                .with("quantity", *quantity),
            CartAction::Update { line_id, quantity } => event
                .with("lineId", line_id.as_str())
                .with("quantity", *quantity),
            CartAction::Remove { line_id } => event.with("lineId", line_id.as_str()),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

struct EngineInner {
    transport: Arc<dyn RequestTransport>,
    slot: CartIdSlot,
    state: watch::Sender<CartState>,
    signals: SignalBus<CartChanged>,
    telemetry: Arc<dyn Telemetry>,
}

/// Cart synchronization engine.
///
/// Cloning is cheap and every clone drives the same cart.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

impl CartEngine {
    /// Creates an engine with no-op telemetry and a private signal bus.
    pub fn new(transport: Arc<dyn RequestTransport>, store: Arc<dyn KeyValueStore>) -> Self {
        CartEngine::from_parts(
            transport,
            CartIdSlot::new(store, DEFAULT_CART_KEY),
            SignalBus::new(DEFAULT_SIGNAL_CAPACITY),
            Arc::new(NoOpTelemetry),
        )
    }

    /// Starts a builder.
    pub fn builder() -> CartEngineBuilder {
        CartEngineBuilder::new()
    }

    fn from_parts(
        transport: Arc<dyn RequestTransport>,
        slot: CartIdSlot,
        signals: SignalBus<CartChanged>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let (state, _) = watch::channel(CartState::default());
        CartEngine {
            inner: Arc::new(EngineInner {
                transport,
                slot,
                state,
                signals,
                telemetry,
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current state snapshot.
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Current cart snapshot.
    pub fn cart(&self) -> Option<Cart> {
        self.inner.state.borrow().cart.clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe_state(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Receiver for `CartChanged` signals.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<CartChanged> {
        self.inner.signals.subscribe()
    }

    /// The bus this engine publishes on.
    pub fn signals(&self) -> &SignalBus<CartChanged> {
        &self.inner.signals
    }

    /// Persisted cart identifier, if any.
    pub fn cart_id(&self) -> Option<CartIdentifier> {
        self.inner.slot.load()
    }

    fn update_state<F: FnOnce(&mut CartState)>(&self, f: F) {
        self.inner.state.send_modify(f);
    }

    // =========================================================================
    // Fetch Axis
    // =========================================================================

    /// Loads the cart for the persisted identifier.
    ///
    /// ## Outcomes
    /// - No identifier: `cart = None`, no request made
    /// - Backend says not found: identifier purged, `cart = None`, `error = None`
    /// - Transport failure: `error = "connection error"`, cart untouched
    /// - Success: cart replaced
    pub async fn fetch_cart(&self) {
        let Some(cart_id) = self.inner.slot.load() else {
            debug!("fetch_cart: no persisted cart id");
            self.update_state(|s| {
                s.cart = None;
                s.error = None;
                s.is_loading = false;
            });
            return;
        };

        debug!(cart_id = %cart_id, "fetch_cart");
        self.update_state(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let outcome = self
            .inner
            .transport
            .query(Document::CartQuery, json!({ "cartId": cart_id.as_str() }))
            .await;

        match outcome {
            Ok(response) if response.is_not_found() => {
                info!(cart_id = %cart_id, "Cart expired on backend, starting over");
                self.inner.slot.clear();
                self.update_state(|s| {
                    s.cart = None;
                    s.error = None;
                    s.is_loading = false;
                });
            }
            Ok(response) => match decode_cart(response) {
                Ok(cart) => {
                    self.update_state(|s| {
                        s.cart = Some(cart);
                        s.error = None;
                        s.is_loading = false;
                    });
                }
                Err(e) => self.fail_fetch(&cart_id, &e),
            },
            Err(e) => self.fail_fetch(&cart_id, &e.into()),
        }
    }

    /// Re-runs [`fetch_cart`](Self::fetch_cart).
    pub async fn refetch(&self) {
        self.fetch_cart().await;
    }

    fn fail_fetch(&self, cart_id: &CartIdentifier, err: &CartError) {
        warn!(cart_id = %cart_id, error = %err.detail(), "fetch_cart failed, keeping last snapshot");
        self.update_state(|s| {
            s.error = Some(CONNECTION_ERROR_MESSAGE.to_string());
            s.is_loading = false;
        });
    }

    // =========================================================================
    // Action Axis
    // =========================================================================

    /// Adds a variant to the cart, creating the cart on first use.
    ///
    /// `quantity` defaults to [`DEFAULT_ADD_QUANTITY`].
    pub async fn add_to_cart(&self, variant_id: &str, quantity: Option<u32>) -> CartResult<Cart> {
        let quantity = quantity.unwrap_or(DEFAULT_ADD_QUANTITY);
        debug!(variant_id = %variant_id, quantity, "add_to_cart");
        self.run_action(CartAction::Add {
            variant_id: variant_id.to_string(),
            quantity,
        })
        .await
    }

    /// Sets a line's quantity. Zero is passed through; the backend removes
    /// the line.
    pub async fn update_cart(&self, line_id: &str, quantity: u32) -> CartResult<Cart> {
        debug!(line_id = %line_id, quantity, "update_cart");
        self.run_action(CartAction::Update {
            line_id: line_id.to_string(),
            quantity,
        })
        .await
    }

    /// Removes a line.
    pub async fn remove_from_cart(&self, line_id: &str) -> CartResult<Cart> {
        debug!(line_id = %line_id, "remove_from_cart");
        self.run_action(CartAction::Remove {
            line_id: line_id.to_string(),
        })
        .await
    }

    async fn run_action(&self, action: CartAction) -> CartResult<Cart> {
        self.update_state(|s| {
            s.action_error = None;
            s.action_loading = true;
        });

        let result = self.execute(&action).await;

        match result {
            Ok(cart) => {
                let snapshot = cart.clone();
                self.update_state(move |s| {
                    s.cart = Some(snapshot);
                    s.action_loading = false;
                });
                self.inner.signals.publish(CartChanged);
                self.track(
                    action
                        .event(action.name())
                        .with("resultingCartId", cart.id.as_str()),
                );
                Ok(cart)
            }
            Err(err) => {
                warn!(operation = action.name(), error = %err.detail(), "Cart action failed");
                let message = err.to_string();
                self.update_state(move |s| {
                    s.action_error = Some(message);
                    s.action_loading = false;
                });
                self.track(
                    action
                        .event(CART_ACTION_FAILED_EVENT)
                        .with("operation", action.name())
                        .with("cartId", self.working_cart_id().map(CartIdentifier::into_inner))
                        .with("error", err.to_string()),
                );
                Err(err)
            }
        }
    }

    async fn execute(&self, action: &CartAction) -> CartResult<Cart> {
        let transport = &self.inner.transport;
        let cart_id = self.working_cart_id();

        match (action, cart_id) {
            (
                CartAction::Add {
                    variant_id,
                    quantity,
                },
                None,
            ) => {
                let variables = json!({
                    "input": { "lines": [{ "merchandiseId": variant_id, "quantity": quantity }] }
                });
                let response = transport.mutate(Document::CartCreate, variables).await?;
                let cart = decode_cart(response)?;
                self.inner.slot.save(&cart.id);
                info!(cart_id = %cart.id, "Created cart");
                Ok(cart)
            }
            (
                CartAction::Add {
                    variant_id,
                    quantity,
                },
                Some(cart_id),
            ) => {
                let variables = json!({
                    "cartId": cart_id.as_str(),
                    "lines": [{ "merchandiseId": variant_id, "quantity": quantity }]
                });
                decode_cart(transport.mutate(Document::CartLinesAdd, variables).await?)
            }
            (CartAction::Update { .. } | CartAction::Remove { .. }, None) => {
                Err(CartError::CartNotFound)
            }
            (CartAction::Update { line_id, quantity }, Some(cart_id)) => {
                let variables = json!({
                    "cartId": cart_id.as_str(),
                    "lines": [{ "id": line_id, "quantity": quantity }]
                });
                decode_cart(transport.mutate(Document::CartLinesUpdate, variables).await?)
            }
            (CartAction::Remove { line_id }, Some(cart_id)) => {
                let variables = json!({
                    "cartId": cart_id.as_str(),
                    "lineIds": [line_id]
                });
                decode_cart(transport.mutate(Document::CartLinesRemove, variables).await?)
            }
        }
    }

    /// Identifier mutations are scoped to.
    ///
    /// The persisted slot wins. When it is empty while a snapshot is held
    /// (the store refused the write after create), the snapshot's id is used
    /// and persisting it is retried.
    fn working_cart_id(&self) -> Option<CartIdentifier> {
        if let Some(id) = self.inner.slot.load() {
            return Some(id);
        }

        let id = self.inner.state.borrow().cart.as_ref().map(|c| c.id.clone())?;
        debug!(cart_id = %id, "No persisted cart id, using snapshot id");
        self.inner.slot.save(&id);
        Some(id)
    }

    fn track(&self, event: TelemetryEvent) {
        let name = event.name.clone();
        if let Err(e) = self.inner.telemetry.track(event) {
            warn!(event = %name, error = %e, "Dropping telemetry event");
        }
    }
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine")
            .field("slot", &self.inner.slot)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

/// Turns a backend response into the authoritative cart snapshot.
///
/// User errors win over request errors; a response without a cart is a
/// connection-class failure.
fn decode_cart(response: TransportResponse) -> CartResult<Cart> {
    if let Some(message) = response.first_user_error() {
        return Err(CartError::UserError(message.to_string()));
    }

    if !response.errors.is_empty() {
        return Err(CartError::Connection(response.error_summary()));
    }

    response
        .cart()?
        .ok_or_else(|| CartError::Connection("response carried no cart".into()))
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`CartEngine`].
pub struct CartEngineBuilder {
    transport: Option<Arc<dyn RequestTransport>>,
    store: Option<Arc<dyn KeyValueStore>>,
    cart_key: String,
    signals: Option<SignalBus<CartChanged>>,
    signal_capacity: usize,
    telemetry: Option<Arc<dyn Telemetry>>,
}

impl CartEngineBuilder {
    pub fn new() -> Self {
        CartEngineBuilder {
            transport: None,
            store: None,
            cart_key: DEFAULT_CART_KEY.to_string(),
            signals: None,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
            telemetry: None,
        }
    }

    /// Pre-fills the builder from configuration.
    ///
    /// Wires the HTTP transport when an endpoint is configured, the file
    /// store in the configured (or platform) directory, and the tracing
    /// telemetry sink when telemetry is enabled.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut builder = CartEngineBuilder::new()
            .with_cart_key(config.cart_key())
            .with_signal_capacity(config.signals.capacity);

        if config.endpoint().is_some() {
            builder = builder.with_transport(Arc::new(HttpTransport::from_config(config)?));
        }

        let store = match config.storage.dir {
            Some(ref dir) => FileStore::new(dir),
            None => FileStore::in_default_location()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?,
        };
        builder = builder.with_store(Arc::new(store));

        if config.telemetry.enabled {
            builder = builder.with_telemetry(Arc::new(TracingTelemetry));
        }

        Ok(builder)
    }

    pub fn with_transport(mut self, transport: Arc<dyn RequestTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cart_key(mut self, key: impl Into<String>) -> Self {
        self.cart_key = key.into();
        self
    }

    /// Publishes on an existing bus instead of a private one.
    pub fn with_signals(mut self, signals: SignalBus<CartChanged>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn with_signal_capacity(mut self, capacity: usize) -> Self {
        self.signal_capacity = capacity;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the engine. A transport is required; the store defaults to
    /// memory and telemetry to no-op.
    pub fn build(self) -> Result<CartEngine, ConfigError> {
        let transport = self
            .transport
            .ok_or_else(|| ConfigError::Invalid("A request transport is required".into()))?;

        if self.cart_key.trim().is_empty() {
            return Err(ConfigError::Invalid("Cart key must not be empty".into()));
        }

        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let signals = self
            .signals
            .unwrap_or_else(|| SignalBus::new(self.signal_capacity));
        let telemetry = self.telemetry.unwrap_or_else(|| Arc::new(NoOpTelemetry));

        Ok(CartEngine::from_parts(
            transport,
            CartIdSlot::new(store, self.cart_key),
            signals,
            telemetry,
        ))
    }
}

impl Default for CartEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::error::{StorageError, StorageResult, CART_NOT_FOUND_MESSAGE};
    use crate::memory::{Failure, InMemoryBackend};
    use crate::telemetry::{PropertyValue, RecordingTelemetry};

    struct Harness {
        engine: CartEngine,
        backend: Arc<InMemoryBackend>,
        store: Arc<MemoryStore>,
        telemetry: Arc<RecordingTelemetry>,
    }

    fn harness() -> Harness {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryStore::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let engine = CartEngine::builder()
            .with_transport(backend.clone())
            .with_store(store.clone())
            .with_telemetry(telemetry.clone())
            .build()
            .unwrap();
        Harness {
            engine,
            backend,
            store,
            telemetry,
        }
    }

    fn persisted(h: &Harness) -> Option<String> {
        h.store.get_item(DEFAULT_CART_KEY).unwrap()
    }

    /// Memory store whose writes can be switched off.
    #[derive(Default)]
    struct SwitchableStore {
        items: MemoryStore,
        read_only: AtomicBool,
    }

    impl KeyValueStore for SwitchableStore {
        fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
            self.items.get_item(key)
        }

        fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(StorageError::NoLocation);
            }
            self.items.set_item(key, value)
        }

        fn remove_item(&self, key: &str) -> StorageResult<()> {
            self.items.remove_item(key)
        }
    }

    #[tokio::test]
    async fn test_fetch_without_id_never_calls_transport() {
        let h = harness();
        h.engine.fetch_cart().await;

        let state = h.engine.state();
        assert!(state.cart.is_none());
        assert!(state.error.is_none());
        assert!(!state.is_loading);
        assert_eq!(h.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_first_add_creates_exactly_one_cart() {
        let h = harness();

        h.engine.add_to_cart("variant-1", None).await.unwrap();
        h.engine.add_to_cart("variant-2", Some(3)).await.unwrap();
        h.engine.add_to_cart("variant-1", Some(1)).await.unwrap();

        assert_eq!(h.backend.calls_to(Document::CartCreate), 1);
        assert_eq!(h.backend.calls_to(Document::CartLinesAdd), 2);
        assert_eq!(h.backend.cart_count(), 1);
        assert_eq!(persisted(&h).as_deref(), Some("cart-A"));

        let cart = h.engine.cart().unwrap();
        assert_eq!(cart.total_quantity, 5);
        assert_eq!(cart.line_count(), 2);
    }

    #[tokio::test]
    async fn test_unwritable_store_never_creates_second_cart() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(SwitchableStore::default());
        store.read_only.store(true, Ordering::SeqCst);
        let engine = CartEngine::new(backend.clone(), store.clone());

        engine.add_to_cart("variant-1", None).await.unwrap();
        assert!(engine.cart_id().is_none());

        let cart = engine.add_to_cart("variant-2", Some(2)).await.unwrap();
        assert_eq!(cart.id.as_str(), "cart-A");
        assert_eq!(cart.total_quantity, 3);
        assert_eq!(backend.cart_count(), 1);
        assert_eq!(backend.calls_to(Document::CartCreate), 1);

        let calls = backend.calls();
        assert_eq!(calls[1].document, Document::CartLinesAdd);
        assert_eq!(calls[1].variables["cartId"], "cart-A");

        // Line mutations are scoped to the snapshot's cart too.
        let line_id = cart.line_for_variant("variant-2").unwrap().id.clone();
        let cart = engine.remove_from_cart(&line_id).await.unwrap();
        assert_eq!(cart.total_quantity, 1);

        // Once the store accepts writes again the id is persisted.
        store.read_only.store(false, Ordering::SeqCst);
        engine.add_to_cart("variant-1", None).await.unwrap();
        assert_eq!(engine.cart_id().map(CartIdentifier::into_inner).as_deref(), Some("cart-A"));
        assert_eq!(backend.cart_count(), 1);
    }

    #[tokio::test]
    async fn test_full_lifecycle_scenario() {
        let h = harness();

        let cart = h.engine.add_to_cart("variant-1", Some(2)).await.unwrap();
        assert_eq!(cart.id.as_str(), "cart-A");
        assert_eq!(cart.total_quantity, 2);
        assert_eq!(persisted(&h).as_deref(), Some("cart-A"));

        let line_id = cart.line_for_variant("variant-1").unwrap().id.clone();
        let cart = h.engine.update_cart(&line_id, 5).await.unwrap();
        assert_eq!(cart.total_quantity, 5);

        let cart = h.engine.remove_from_cart(&line_id).await.unwrap();
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total_quantity, 0);
        assert_eq!(persisted(&h).as_deref(), Some("cart-A"));

        let state = h.engine.state();
        assert_eq!(state.cart, Some(cart));
        assert!(state.action_error.is_none());
        assert!(!state.action_loading);
    }

    #[tokio::test]
    async fn test_expired_cart_is_not_an_error() {
        let h = harness();
        h.engine.add_to_cart("variant-1", Some(1)).await.unwrap();
        h.backend.expire("cart-A");

        h.engine.fetch_cart().await;

        let state = h.engine.state();
        assert!(state.cart.is_none());
        assert!(state.error.is_none());
        assert!(persisted(&h).is_none());

        // Second fetch behaves like the no-identifier case.
        let calls_before = h.backend.call_count();
        h.engine.fetch_cart().await;
        assert_eq!(h.backend.call_count(), calls_before);
        assert!(h.engine.state().cart.is_none());
    }

    #[tokio::test]
    async fn test_not_found_error_code_also_expires() {
        let h = harness();
        h.store.set_item(DEFAULT_CART_KEY, "cart-Z").unwrap();
        h.backend.fail_next(Failure::NotFound);

        h.engine.fetch_cart().await;

        assert!(persisted(&h).is_none());
        assert!(h.engine.state().error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stale_cart() {
        let h = harness();
        let cart = h.engine.add_to_cart("variant-1", Some(2)).await.unwrap();

        h.backend.fail_next(Failure::Transport);
        h.engine.fetch_cart().await;

        let state = h.engine.state();
        assert_eq!(state.error.as_deref(), Some(CONNECTION_ERROR_MESSAGE));
        assert_eq!(state.cart, Some(cart));
        assert!(!state.is_loading);
        assert_eq!(persisted(&h).as_deref(), Some("cart-A"));

        // Manual retry clears the error.
        h.engine.refetch().await;
        assert!(h.engine.state().error.is_none());
    }

    #[tokio::test]
    async fn test_request_level_errors_on_fetch_are_connection_errors() {
        let h = harness();
        h.engine.add_to_cart("variant-1", None).await.unwrap();

        h.backend.fail_next(Failure::RequestError("Throttled".into()));
        h.engine.fetch_cart().await;

        assert_eq!(
            h.engine.state().error.as_deref(),
            Some(CONNECTION_ERROR_MESSAGE)
        );
        assert!(h.engine.cart().is_some());
    }

    #[tokio::test]
    async fn test_update_without_cart_is_precondition_failure() {
        let h = harness();

        let err = h.engine.update_cart("line-1", 2).await.unwrap_err();
        assert_eq!(err, CartError::CartNotFound);

        let err = h.engine.remove_from_cart("line-1").await.unwrap_err();
        assert_eq!(err, CartError::CartNotFound);

        let state = h.engine.state();
        assert_eq!(state.action_error.as_deref(), Some(CART_NOT_FOUND_MESSAGE));
        assert!(!state.action_loading);
        assert_eq!(h.backend.call_count(), 0);
        assert_eq!(h.telemetry.named(CART_ACTION_FAILED_EVENT).len(), 2);
    }

    #[tokio::test]
    async fn test_update_to_zero_is_sent_to_backend() {
        let h = harness();
        let cart = h.engine.add_to_cart("variant-1", Some(2)).await.unwrap();
        let line_id = cart.lines[0].id.clone();

        let cart = h.engine.update_cart(&line_id, 0).await.unwrap();

        assert_eq!(h.backend.calls_to(Document::CartLinesUpdate), 1);
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total_quantity, 0);
    }

    #[tokio::test]
    async fn test_user_error_passes_through_and_keeps_cart() {
        let h = harness();
        let cart = h.engine.add_to_cart("variant-1", Some(1)).await.unwrap();

        h.backend
            .fail_next(Failure::UserError("Only 3 items available".into()));
        let err = h.engine.add_to_cart("variant-1", Some(10)).await.unwrap_err();

        assert_eq!(err, CartError::UserError("Only 3 items available".into()));
        let state = h.engine.state();
        assert_eq!(state.action_error.as_deref(), Some("Only 3 items available"));
        assert_eq!(state.cart, Some(cart));
    }

    #[tokio::test]
    async fn test_transport_failure_on_create_persists_nothing() {
        let h = harness();
        h.backend.fail_next(Failure::Transport);

        let err = h.engine.add_to_cart("variant-1", None).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(
            h.engine.state().action_error.as_deref(),
            Some(CONNECTION_ERROR_MESSAGE)
        );
        assert!(persisted(&h).is_none());
        assert!(h.engine.cart().is_none());
    }

    #[tokio::test]
    async fn test_signals_and_telemetry_per_outcome() {
        let h = harness();
        let mut changes = h.engine.subscribe_changes();

        let cart = h.engine.add_to_cart("variant-1", Some(2)).await.unwrap();
        assert_eq!(changes.try_recv().unwrap(), CartChanged);
        assert!(changes.try_recv().is_err());

        let successes = h.telemetry.named(ADD_TO_CART_EVENT);
        assert_eq!(successes.len(), 1);
        assert_eq!(
            successes[0].property("variantId"),
            Some(&PropertyValue::from("variant-1"))
        );
        assert_eq!(successes[0].property("quantity"), Some(&PropertyValue::Number(2.0)));
        assert_eq!(
            successes[0].property("resultingCartId"),
            Some(&PropertyValue::from("cart-A"))
        );

        h.backend.fail_next(Failure::Transport);
        let line_id = cart.lines[0].id.clone();
        h.engine.update_cart(&line_id, 4).await.unwrap_err();
        assert!(changes.try_recv().is_err());

        let failures = h.telemetry.named(CART_ACTION_FAILED_EVENT);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].property("operation"),
            Some(&PropertyValue::from(UPDATE_CART_EVENT))
        );
        assert_eq!(failures[0].property("lineId"), Some(&PropertyValue::from(line_id.as_str())));
        assert_eq!(failures[0].property("quantity"), Some(&PropertyValue::Number(4.0)));
        assert!(h.telemetry.named(UPDATE_CART_EVENT).is_empty());

        h.engine.update_cart(&line_id, 4).await.unwrap();
        assert_eq!(changes.try_recv().unwrap(), CartChanged);
        assert!(changes.try_recv().is_err());

        let updates = h.telemetry.named(UPDATE_CART_EVENT);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].property("lineId"), Some(&PropertyValue::from(line_id.as_str())));
        assert_eq!(updates[0].property("quantity"), Some(&PropertyValue::Number(4.0)));
        assert_eq!(
            updates[0].property("resultingCartId"),
            Some(&PropertyValue::from("cart-A"))
        );

        h.engine.remove_from_cart(&line_id).await.unwrap();
        assert_eq!(changes.try_recv().unwrap(), CartChanged);
        assert!(changes.try_recv().is_err());

        let removals = h.telemetry.named(REMOVE_FROM_CART_EVENT);
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].property("lineId"), Some(&PropertyValue::from(line_id.as_str())));
        assert_eq!(
            removals[0].property("resultingCartId"),
            Some(&PropertyValue::from("cart-A"))
        );
        assert_eq!(h.telemetry.named(CART_ACTION_FAILED_EVENT).len(), 1);
        assert_eq!(h.telemetry.events().len(), 4);
    }

    #[tokio::test]
    async fn test_failing_telemetry_never_reaches_caller() {
        let h = harness();
        h.telemetry.fail_all();

        let cart = h.engine.add_to_cart("variant-1", None).await;
        assert!(cart.is_ok());
        assert!(h.engine.state().action_error.is_none());
    }

    #[tokio::test]
    async fn test_action_loading_only_while_pending() {
        let h = harness();
        let mut states = h.engine.subscribe_state();
        h.backend.hold_responses();

        let engine = h.engine.clone();
        let pending = tokio::spawn(async move { engine.add_to_cart("variant-1", None).await });

        states.wait_for(|s| s.action_loading).await.unwrap();
        assert!(h.engine.state().action_loading);
        assert!(h.engine.state().action_error.is_none());

        while h.backend.pending_responses() < 1 {
            tokio::task::yield_now().await;
        }
        h.backend.resume();
        pending.await.unwrap().unwrap();

        assert!(!h.engine.state().action_loading);

        // A second, failing call starts from a clean action axis.
        h.backend.fail_next(Failure::UserError("nope".into()));
        h.engine.add_to_cart("variant-1", None).await.unwrap_err();
        let state = h.engine.state();
        assert!(!state.action_loading);
        assert_eq!(state.action_error.as_deref(), Some("nope"));

        h.engine.add_to_cart("variant-1", None).await.unwrap();
        assert!(h.engine.state().action_error.is_none());
    }

    #[tokio::test]
    async fn test_last_response_wins_on_overlap() {
        let h = harness();
        let cart = h.engine.add_to_cart("variant-1", Some(1)).await.unwrap();
        let line_id = cart.lines[0].id.clone();

        h.backend.hold_responses();

        let first = {
            let engine = h.engine.clone();
            let line_id = line_id.clone();
            tokio::spawn(async move { engine.update_cart(&line_id, 5).await })
        };
        while h.backend.pending_responses() < 1 {
            tokio::task::yield_now().await;
        }

        let second = {
            let engine = h.engine.clone();
            let line_id = line_id.clone();
            tokio::spawn(async move { engine.update_cart(&line_id, 7).await })
        };
        while h.backend.pending_responses() < 2 {
            tokio::task::yield_now().await;
        }

        // The later request resolves first, the earlier one last.
        h.backend.release(1);
        assert_eq!(second.await.unwrap().unwrap().total_quantity, 7);
        h.backend.release(0);
        assert_eq!(first.await.unwrap().unwrap().total_quantity, 5);

        assert_eq!(h.engine.cart().unwrap().total_quantity, 5);
    }

    #[tokio::test]
    async fn test_engines_sharing_a_store_share_the_cart() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryStore::new());
        let signals = SignalBus::new(4);

        let a = CartEngine::builder()
            .with_transport(backend.clone())
            .with_store(store.clone())
            .with_signals(signals.clone())
            .build()
            .unwrap();
        let b = CartEngine::builder()
            .with_transport(backend.clone())
            .with_store(store.clone())
            .with_signals(signals.clone())
            .build()
            .unwrap();

        let mut rx = b.subscribe_changes();
        a.add_to_cart("variant-9", Some(4)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), CartChanged);

        b.refetch().await;
        assert_eq!(b.state().item_count(), 4);
        assert_eq!(backend.cart_count(), 1);
    }

    #[test]
    fn test_builder_requires_transport() {
        assert!(CartEngine::builder().build().is_err());
        assert!(CartEngine::builder()
            .with_transport(Arc::new(InMemoryBackend::new()))
            .with_cart_key("")
            .build()
            .is_err());
    }

    #[test]
    fn test_builder_from_config_uses_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorefrontConfig::default();
        config.storage.dir = Some(dir.path().to_path_buf());
        config.telemetry.enabled = false;

        let engine = CartEngineBuilder::from_config(&config)
            .unwrap()
            .with_transport(Arc::new(InMemoryBackend::new()))
            .build()
            .unwrap();

        assert!(engine.cart_id().is_none());
    }
}
