//! # Modules and Capabilities
//!
//! What a feature module is, and the narrow capability records modules
//! expose to each other.
//!
//! ## Typed Slots
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Closed Capability Map                                │
//! │                                                                         │
//! │  ModuleName          ModuleApi variant              Slot                │
//! │  ─────────────────   ────────────────────────────   ─────────────────   │
//! │  Cart            →   Cart(Arc<dyn CartApi>)         CartSlot            │
//! │  Notifications   →   Notifications(Arc<dyn          NotificationsSlot   │
//! │                         NotificationApi>)                               │
//! │                                                                         │
//! │  registry.api::<CartSlot>() → Option<Arc<dyn CartApi>>                  │
//! │  (no string keys, no runtime casts)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_cart::CartResult;
use storefront_core::{Cart, CartState};

use crate::error::ModuleResult;
use crate::notifications::{Notification, NotificationKind};

// =============================================================================
// Module Names
// =============================================================================

/// Every module the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleName {
    Cart,
    Notifications,
}

impl ModuleName {
    /// All names, in display order.
    pub const ALL: [ModuleName; 2] = [ModuleName::Cart, ModuleName::Notifications];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleName::Cart => "cart",
            ModuleName::Notifications => "notifications",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Capability Records
// =============================================================================

/// What the cart module lets other modules do.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Current cart state snapshot.
    fn state(&self) -> CartState;

    /// Total quantity across lines (0 without a cart).
    fn item_count(&self) -> u32;

    async fn add_to_cart(&self, variant_id: &str, quantity: Option<u32>) -> CartResult<Cart>;

    async fn update_cart(&self, line_id: &str, quantity: u32) -> CartResult<Cart>;

    async fn remove_from_cart(&self, line_id: &str) -> CartResult<Cart>;

    async fn refetch(&self);
}

/// What the notification module lets other modules do.
pub trait NotificationApi: Send + Sync {
    /// Posts a notification and returns its id.
    fn notify(&self, kind: NotificationKind, message: &str) -> Uuid;

    /// Removes one notification. Returns false if it was already gone.
    fn dismiss(&self, id: Uuid) -> bool;

    /// Removes every notification.
    fn clear(&self);

    /// Notifications currently shown, oldest first.
    fn active(&self) -> Vec<Notification>;
}

/// A module's public API, tagged by slot.
#[derive(Clone)]
pub enum ModuleApi {
    Cart(Arc<dyn CartApi>),
    Notifications(Arc<dyn NotificationApi>),
}

impl ModuleApi {
    /// Slot this API belongs in.
    pub fn name(&self) -> ModuleName {
        match self {
            ModuleApi::Cart(_) => ModuleName::Cart,
            ModuleApi::Notifications(_) => ModuleName::Notifications,
        }
    }
}

impl fmt::Debug for ModuleApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModuleApi").field(&self.name()).finish()
    }
}

// =============================================================================
// Typed Slots
// =============================================================================

/// Compile-time link between a module name and its capability type.
pub trait ModuleSlot {
    const NAME: ModuleName;
    type Api: ?Sized + Send + Sync;

    /// Pulls the typed API out of a tagged one; `None` on a mismatched tag.
    fn extract(api: ModuleApi) -> Option<Arc<Self::Api>>;
}

/// Slot of the cart module.
#[derive(Debug, Clone, Copy)]
pub struct CartSlot;

impl ModuleSlot for CartSlot {
    const NAME: ModuleName = ModuleName::Cart;
    type Api = dyn CartApi;

    fn extract(api: ModuleApi) -> Option<Arc<dyn CartApi>> {
        match api {
            ModuleApi::Cart(api) => Some(api),
            _ => None,
        }
    }
}

/// Slot of the notification module.
#[derive(Debug, Clone, Copy)]
pub struct NotificationsSlot;

impl ModuleSlot for NotificationsSlot {
    const NAME: ModuleName = ModuleName::Notifications;
    type Api = dyn NotificationApi;

    fn extract(api: ModuleApi) -> Option<Arc<dyn NotificationApi>> {
        match api {
            ModuleApi::Notifications(api) => Some(api),
            _ => None,
        }
    }
}

// =============================================================================
// Module
// =============================================================================

/// A registrable feature unit.
#[async_trait]
pub trait Module: Send + Sync {
    /// One-time warm-up run on registration (e.g. the initial cart fetch).
    async fn initialize(&self) -> ModuleResult<()>;

    /// Builds the public API. Called on every lookup; never cached.
    fn public_api(&self) -> ModuleApi;

    /// Cleanup on unmount.
    async fn destroy(&self) {}
}

/// Static description registered alongside a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleConfig {
    pub name: ModuleName,

    /// Routes the module's UI owns.
    #[serde(default)]
    pub routes: Vec<String>,

    /// Names of the capabilities in the module's public API.
    #[serde(default, rename = "publicAPI")]
    pub public_api: Vec<String>,

    /// Modules this one calls when they are loaded. Not enforced.
    #[serde(default)]
    pub dependencies: Vec<ModuleName>,
}

impl ModuleConfig {
    pub fn new(name: ModuleName) -> Self {
        ModuleConfig {
            name,
            routes: Vec::new(),
            public_api: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_public_api<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_api = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = ModuleName>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }
}
