//! # storefront-modules: Feature Module Registry
//!
//! Independently built storefront features (cart, notifications, ...)
//! register a narrow capability record here and call each other through
//! it, without importing each other's internals.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Module Registry Architecture                         │
//! │                                                                         │
//! │  ProviderScope ── holds Option<Arc<ModuleRegistry>>                    │
//! │    ├── use_module_registry()  strict: Err(MissingProvider) if absent   │
//! │    └── safe()                 SafeRegistry: None / false / no-op       │
//! │                                                                         │
//! │  ModuleMount ──render() once──► ModuleRegistry                         │
//! │    CartModule          ──►  cart          → Arc<dyn CartApi>           │
//! │    NotificationModule  ──►  notifications → Arc<dyn NotificationApi>   │
//! │                                                                         │
//! │  CrossModuleAccessor (over SafeRegistry)                                │
//! │    cart()          → ModuleHandle { api, is_loaded }                    │
//! │    notifications() → ModuleHandle { api, is_loaded }                    │
//! │    changed().await → registry revision moved                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`module`] - Module trait, names, capability traits, typed slots
//! - [`registry`] - Registry, provider scope, strict and safe accessors
//! - [`mount`] - Register-once guard
//! - [`cross`] - Cross-module accessor
//! - [`notifications`] - Notification center
//! - [`adapters`] - Cart and notification modules
//! - [`error`] - Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storefront_cart::{CartEngine, InMemoryBackend, MemoryStore};
//! use storefront_modules::adapters::CartModule;
//! use storefront_modules::{CartApi, CartSlot, ModuleMount, ModuleRegistry, ProviderScope};
//!
//! # async fn demo() {
//! let scope = ProviderScope::new(Arc::new(ModuleRegistry::new()));
//! let engine = CartEngine::new(Arc::new(InMemoryBackend::new()), Arc::new(MemoryStore::new()));
//!
//! let mount = ModuleMount::new(
//!     scope.safe(),
//!     Arc::new(CartModule::new(engine, scope.safe())),
//!     CartModule::config(),
//! );
//! mount.render().await;
//!
//! if let Some(cart) = scope.safe().api::<CartSlot>() {
//!     let _ = cart.add_to_cart("variant-1", Some(1)).await;
//! }
//! # }
//! ```

pub mod adapters;
pub mod cross;
pub mod error;
pub mod module;
pub mod mount;
pub mod notifications;
pub mod registry;

pub use cross::{CrossModuleAccessor, LoadedModules, ModuleHandle};
pub use error::{ModuleError, ModuleResult};
pub use module::{
    CartApi, CartSlot, Module, ModuleApi, ModuleConfig, ModuleName, ModuleSlot, NotificationApi,
    NotificationsSlot,
};
pub use mount::ModuleMount;
pub use notifications::{Notification, NotificationCenter, NotificationKind};
pub use registry::{ModuleRegistry, ProviderScope, SafeRegistry};
