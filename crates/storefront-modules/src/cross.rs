//! # Cross-Module Accessor
//!
//! Typed `{api, is_loaded}` lookups for every known module, built only on
//! the safe accessor so it works with or without a registry provider.
//!
//! ```text
//!   let mut modules = CrossModuleAccessor::new(scope.safe());
//!   if let Some(notify) = modules.notifications().api { ... }
//!   modules.changed().await;   // re-derive after the registry changes
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use crate::module::{CartApi, CartSlot, ModuleName, ModuleSlot, NotificationApi, NotificationsSlot};
use crate::registry::SafeRegistry;

/// One module as seen from another.
pub struct ModuleHandle<A: ?Sized> {
    pub api: Option<Arc<A>>,
    pub is_loaded: bool,
}

impl<A: ?Sized> ModuleHandle<A> {
    fn unloaded() -> Self {
        ModuleHandle {
            api: None,
            is_loaded: false,
        }
    }
}

impl<A: ?Sized> std::fmt::Debug for ModuleHandle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("api", &self.api.is_some())
            .field("is_loaded", &self.is_loaded)
            .finish()
    }
}

/// Load status of every known module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadedModules {
    pub cart: bool,
    pub notifications: bool,
}

/// Typed view of other modules.
#[derive(Debug)]
pub struct CrossModuleAccessor {
    registry: SafeRegistry,
    changes: Option<watch::Receiver<u64>>,
}

impl CrossModuleAccessor {
    pub fn new(registry: SafeRegistry) -> Self {
        let changes = registry.subscribe();
        CrossModuleAccessor { registry, changes }
    }

    /// Resolves any slot.
    pub fn get<S: ModuleSlot>(&self) -> ModuleHandle<S::Api> {
        if !self.registry.is_module_loaded(S::NAME) {
            return ModuleHandle::unloaded();
        }
        ModuleHandle {
            api: self.registry.api::<S>(),
            is_loaded: true,
        }
    }

    pub fn cart(&self) -> ModuleHandle<dyn CartApi> {
        self.get::<CartSlot>()
    }

    pub fn notifications(&self) -> ModuleHandle<dyn NotificationApi> {
        self.get::<NotificationsSlot>()
    }

    pub fn is_loaded(&self, name: ModuleName) -> bool {
        self.registry.is_module_loaded(name)
    }

    pub fn snapshot(&self) -> LoadedModules {
        LoadedModules {
            cart: self.is_loaded(ModuleName::Cart),
            notifications: self.is_loaded(ModuleName::Notifications),
        }
    }

    /// Waits until the module map changes after the last call.
    ///
    /// Returns false right away when there is no registry (nothing can
    /// change) or the registry is gone.
    pub async fn changed(&mut self) -> bool {
        match self.changes {
            Some(ref mut rx) => rx.changed().await.is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::ModuleResult;
    use crate::module::{Module, ModuleApi, ModuleConfig};
    use crate::notifications::{NotificationCenter, NotificationKind};
    use crate::registry::{ModuleRegistry, ProviderScope};

    struct Toasts(NotificationCenter);

    #[async_trait]
    impl Module for Toasts {
        async fn initialize(&self) -> ModuleResult<()> {
            Ok(())
        }

        fn public_api(&self) -> ModuleApi {
            ModuleApi::Notifications(Arc::new(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_accessor_without_provider() {
        let mut modules = CrossModuleAccessor::new(ProviderScope::empty().safe());

        let cart = modules.cart();
        assert!(cart.api.is_none());
        assert!(!cart.is_loaded);
        assert_eq!(modules.snapshot(), LoadedModules::default());
        assert!(!modules.changed().await);
    }

    #[tokio::test]
    async fn test_accessor_follows_registry() {
        let registry = Arc::new(ModuleRegistry::new());
        let mut modules = CrossModuleAccessor::new(ProviderScope::new(registry.clone()).safe());
        assert!(!modules.notifications().is_loaded);

        let center = NotificationCenter::new();
        registry
            .register_module(
                ModuleName::Notifications,
                Arc::new(Toasts(center.clone())),
                ModuleConfig::new(ModuleName::Notifications),
            )
            .await
            .unwrap();

        assert!(modules.changed().await);
        let handle = modules.notifications();
        assert!(handle.is_loaded);
        handle
            .api
            .unwrap()
            .notify(NotificationKind::Info, "cross-module");
        assert_eq!(center.len(), 1);

        assert_eq!(
            modules.snapshot(),
            LoadedModules {
                cart: false,
                notifications: true
            }
        );
    }
}
