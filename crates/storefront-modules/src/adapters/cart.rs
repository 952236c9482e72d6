//! # Cart Module
//!
//! Exposes a [`CartEngine`] to other features as a narrow [`CartApi`].
//!
//! ## Capability Record
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartModule                                                             │
//! │    initialize()  → engine.fetch_cart()   (+ optional refetch listener) │
//! │    public_api()  → CartCapabilities      (fresh record per lookup)     │
//! │    destroy()     → stop refetch listener                               │
//! │                                                                         │
//! │  CartCapabilities                                                       │
//! │    state / item_count / add / update / remove / refetch                │
//! │    add success ──► notifications module (if loaded): "X added to cart" │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use storefront_cart::{spawn_refetch_on_change, CartEngine, CartResult};
use storefront_core::{Cart, CartState};

use crate::cross::CrossModuleAccessor;
use crate::error::ModuleResult;
use crate::module::{CartApi, Module, ModuleApi, ModuleConfig, ModuleName};
use crate::notifications::NotificationKind;
use crate::registry::SafeRegistry;

/// Route owned by the cart page.
pub const CART_ROUTE: &str = "/cart";

/// Cart feature module.
pub struct CartModule {
    engine: CartEngine,
    registry: SafeRegistry,
    refetch_on_change: bool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl CartModule {
    /// Wraps an engine. `registry` is used to reach other modules.
    pub fn new(engine: CartEngine, registry: SafeRegistry) -> Self {
        CartModule {
            engine,
            registry,
            refetch_on_change: false,
            listener: Mutex::new(None),
        }
    }

    /// Refetches whenever a `CartChanged` signal arrives on the engine's bus.
    pub fn with_refetch_on_change(mut self) -> Self {
        self.refetch_on_change = true;
        self
    }

    /// Registration config for the cart module.
    pub fn config() -> ModuleConfig {
        ModuleConfig::new(ModuleName::Cart)
            .with_routes([CART_ROUTE])
            .with_public_api([
                "state",
                "item_count",
                "add_to_cart",
                "update_cart",
                "remove_from_cart",
                "refetch",
            ])
            .with_dependencies([ModuleName::Notifications])
    }

    pub fn engine(&self) -> &CartEngine {
        &self.engine
    }
}

#[async_trait]
impl Module for CartModule {
    async fn initialize(&self) -> ModuleResult<()> {
        // Fetch failures land in CartState::error; they do not fail the module.
        self.engine.fetch_cart().await;

        if self.refetch_on_change {
            let handle = spawn_refetch_on_change(self.engine.clone());
            let previous = self
                .listener
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .replace(handle);
            if let Some(previous) = previous {
                previous.abort();
            }
        }
        Ok(())
    }

    fn public_api(&self) -> ModuleApi {
        ModuleApi::Cart(Arc::new(CartCapabilities {
            engine: self.engine.clone(),
            registry: self.registry.clone(),
        }))
    }

    async fn destroy(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(listener) = listener {
            debug!("Stopping cart refetch listener");
            listener.abort();
        }
    }
}

/// The cart module's public API.
struct CartCapabilities {
    engine: CartEngine,
    registry: SafeRegistry,
}

impl CartCapabilities {
    fn announce_added(&self, cart: &Cart, variant_id: &str) {
        let notifications = CrossModuleAccessor::new(self.registry.clone()).notifications();
        let Some(api) = notifications.api else {
            return;
        };

        let title = cart
            .line_for_variant(variant_id)
            .map(|line| line.title.as_str())
            .unwrap_or("Item");
        api.notify(NotificationKind::Success, &format!("{} added to cart", title));
    }
}

#[async_trait]
impl CartApi for CartCapabilities {
    fn state(&self) -> CartState {
        self.engine.state()
    }

    fn item_count(&self) -> u32 {
        self.engine.state().item_count()
    }

    async fn add_to_cart(&self, variant_id: &str, quantity: Option<u32>) -> CartResult<Cart> {
        let cart = self.engine.add_to_cart(variant_id, quantity).await?;
        self.announce_added(&cart, variant_id);
        Ok(cart)
    }

    async fn update_cart(&self, line_id: &str, quantity: u32) -> CartResult<Cart> {
        self.engine.update_cart(line_id, quantity).await
    }

    async fn remove_from_cart(&self, line_id: &str) -> CartResult<Cart> {
        self.engine.remove_from_cart(line_id).await
    }

    async fn refetch(&self) {
        self.engine.refetch().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storefront_cart::{CartError, InMemoryBackend, MemoryStore, SignalBus};
    use storefront_core::Money;

    use crate::adapters::NotificationModule;
    use crate::module::{CartSlot, NotificationApi};
    use crate::mount::ModuleMount;
    use crate::registry::{ModuleRegistry, ProviderScope};

    fn engine(backend: &Arc<InMemoryBackend>, store: &Arc<MemoryStore>) -> CartEngine {
        CartEngine::new(backend.clone(), store.clone())
    }

    #[tokio::test]
    async fn test_add_posts_notification_when_loaded() {
        let registry = Arc::new(ModuleRegistry::new());
        let scope = ProviderScope::new(registry.clone());
        let backend = Arc::new(InMemoryBackend::new().with_variant(
            "variant-1",
            "Hoodie",
            Money::from_minor_units(4500),
        ));
        let store = Arc::new(MemoryStore::new());

        let notifications = NotificationModule::new();
        let center = notifications.center().clone();
        ModuleMount::new(scope.safe(), Arc::new(notifications), NotificationModule::config())
            .render()
            .await;
        ModuleMount::new(
            scope.safe(),
            Arc::new(CartModule::new(engine(&backend, &store), scope.safe())),
            CartModule::config(),
        )
        .render()
        .await;

        let cart = registry.api::<CartSlot>().unwrap();
        cart.add_to_cart("variant-1", Some(2)).await.unwrap();

        assert_eq!(cart.item_count(), 2);
        let active = center.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "Hoodie added to cart");
        assert_eq!(active[0].kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn test_add_without_notifications_module() {
        let registry = Arc::new(ModuleRegistry::new());
        let scope = ProviderScope::new(registry.clone());
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryStore::new());

        registry
            .register_module(
                ModuleName::Cart,
                Arc::new(CartModule::new(engine(&backend, &store), scope.safe())),
                CartModule::config(),
            )
            .await
            .unwrap();

        let cart = registry.api::<CartSlot>().unwrap();
        let snapshot = cart.add_to_cart("variant-1", None).await.unwrap();
        assert_eq!(snapshot.total_quantity, 1);

        let err = cart.remove_from_cart("line-404").await.unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(cart.state().cart, Some(snapshot));
    }

    #[tokio::test]
    async fn test_initialize_fetches_persisted_cart() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryStore::new());
        engine(&backend, &store)
            .add_to_cart("variant-1", Some(3))
            .await
            .unwrap();

        let module = CartModule::new(engine(&backend, &store), SafeRegistry::default());
        assert!(module.engine().state().cart.is_none());

        module.initialize().await.unwrap();
        assert_eq!(module.engine().state().item_count(), 3);
    }

    #[tokio::test]
    async fn test_precondition_error_reaches_caller() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryStore::new());
        let module = CartModule::new(engine(&backend, &store), SafeRegistry::default());

        let ModuleApi::Cart(api) = module.public_api() else {
            panic!("cart module must expose the cart slot");
        };
        assert_eq!(
            api.update_cart("line-1", 2).await.unwrap_err(),
            CartError::CartNotFound
        );
        assert_eq!(api.state().action_error.as_deref(), Some("cart not found"));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refetch_listener_follows_peer_engine() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(MemoryStore::new());
        let signals = SignalBus::new(8);

        let build = || {
            CartEngine::builder()
                .with_transport(backend.clone())
                .with_store(store.clone())
                .with_signals(signals.clone())
                .build()
                .unwrap()
        };
        let peer = build();
        let module = CartModule::new(build(), SafeRegistry::default()).with_refetch_on_change();
        module.initialize().await.unwrap();

        let mut state = module.engine().subscribe_state();
        peer.add_to_cart("variant-7", Some(4)).await.unwrap();
        state.wait_for(|s| s.item_count() == 4).await.unwrap();

        module.destroy().await;
        assert!(module.listener.lock().unwrap().is_none());
    }
}
