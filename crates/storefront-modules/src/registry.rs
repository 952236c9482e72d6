//! # Module Registry
//!
//! Scoped container mapping a module name to its module and config.
//!
//! ## Registry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  register_module(name, module, config)                                 │
//! │    1. insert / overwrite entry     (last write wins, no de-dup)         │
//! │    2. revision += 1                ──► watch subscribers re-derive      │
//! │    3. module.initialize().await                                         │
//! │                                                                         │
//! │  get_module(name)       → Option<Arc<dyn Module>>                       │
//! │  get_module_api(name)   → Option<ModuleApi>     (built fresh each call) │
//! │  api::<Slot>()          → Option<Arc<Slot::Api>>                        │
//! │  is_module_loaded(name) → bool                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Registries are plain values. Tests and independent UI roots each create
//! their own; nothing here is process-global.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ModuleError, ModuleResult};
use crate::module::{Module, ModuleApi, ModuleConfig, ModuleName, ModuleSlot};

struct RegistryEntry {
    module: Arc<dyn Module>,
    config: ModuleConfig,
}

/// Feature module registry.
pub struct ModuleRegistry {
    entries: RwLock<HashMap<ModuleName, RegistryEntry>>,
    revision: watch::Sender<u64>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        ModuleRegistry {
            entries: RwLock::new(HashMap::new()),
            revision,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ModuleName, RegistryEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ModuleName, RegistryEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Inserts or overwrites the entry for `name`, then initializes the module.
    ///
    /// Calling this twice for one name runs `initialize` twice; callers
    /// guard with [`ModuleMount`](crate::mount::ModuleMount). A module whose
    /// initialization fails stays registered.
    pub async fn register_module(
        &self,
        name: ModuleName,
        module: Arc<dyn Module>,
        config: ModuleConfig,
    ) -> ModuleResult<()> {
        if config.name != name {
            warn!(%name, config_name = %config.name, "Module config name does not match registration name");
        }

        for dependency in &config.dependencies {
            if !self.is_module_loaded(*dependency) {
                debug!(%name, %dependency, "Registering before dependency is loaded");
            }
        }

        let replaced = self
            .write()
            .insert(
                name,
                RegistryEntry {
                    module: module.clone(),
                    config,
                },
            )
            .is_some();
        self.bump();

        if replaced {
            warn!(%name, "Module re-registered, previous entry replaced");
        } else {
            info!(%name, "Module registered");
        }

        module.initialize().await.map_err(|e| {
            warn!(%name, error = %e, "Module initialization failed");
            match e {
                failed @ ModuleError::InitializationFailed { .. } => failed,
                other => ModuleError::InitializationFailed {
                    name,
                    reason: other.to_string(),
                },
            }
        })
    }

    /// Removes `name` if it still holds `module`.
    ///
    /// A newer registration under the same name is left alone. Returns true
    /// if an entry was removed.
    pub fn unregister_module(&self, name: ModuleName, module: &Arc<dyn Module>) -> bool {
        let mut entries = self.write();
        let is_current = entries
            .get(&name)
            .map(|entry| same_module(&entry.module, module))
            .unwrap_or(false);

        if !is_current {
            return false;
        }

        entries.remove(&name);
        drop(entries);
        self.bump();
        info!(%name, "Module unregistered");
        true
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get_module(&self, name: ModuleName) -> Option<Arc<dyn Module>> {
        self.read().get(&name).map(|entry| entry.module.clone())
    }

    pub fn module_config(&self, name: ModuleName) -> Option<ModuleConfig> {
        self.read().get(&name).map(|entry| entry.config.clone())
    }

    /// Builds the module's public API.
    pub fn get_module_api(&self, name: ModuleName) -> Option<ModuleApi> {
        // Release the lock before calling into module code.
        let module = self.get_module(name)?;
        Some(module.public_api())
    }

    /// Typed API lookup.
    pub fn api<S: ModuleSlot>(&self) -> Option<Arc<S::Api>> {
        self.get_module_api(S::NAME).and_then(S::extract)
    }

    pub fn is_module_loaded(&self, name: ModuleName) -> bool {
        self.read().contains_key(&name)
    }

    /// Loaded module names, sorted.
    pub fn loaded_modules(&self) -> Vec<ModuleName> {
        let mut names: Vec<_> = self.read().keys().copied().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Reactivity
    // =========================================================================

    /// Number of changes to the module map so far.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified on every change to the module map.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.loaded_modules())
            .field("revision", &self.revision())
            .finish()
    }
}

fn same_module(a: &Arc<dyn Module>, b: &Arc<dyn Module>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// =============================================================================
// Accessors
// =============================================================================

/// The registry visible from some point in the UI tree, if any.
///
/// Features receive a scope instead of reaching for a global.
#[derive(Debug, Clone, Default)]
pub struct ProviderScope {
    registry: Option<Arc<ModuleRegistry>>,
}

impl ProviderScope {
    /// Scope inside a registry provider.
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        ProviderScope {
            registry: Some(registry),
        }
    }

    /// Scope with no provider above it.
    pub fn empty() -> Self {
        ProviderScope { registry: None }
    }

    pub fn has_provider(&self) -> bool {
        self.registry.is_some()
    }

    /// Strict accessor. Fails when no provider is in scope.
    pub fn use_module_registry(&self) -> ModuleResult<Arc<ModuleRegistry>> {
        self.registry
            .clone()
            .ok_or(ModuleError::MissingProvider {
                accessor: "use_module_registry",
            })
    }

    /// Safe accessor. Never fails.
    pub fn safe(&self) -> SafeRegistry {
        SafeRegistry {
            registry: self.registry.clone(),
        }
    }
}

/// Non-failing façade over an optional registry.
///
/// Without a provider every lookup is `None`/`false` and registration is a
/// no-op.
#[derive(Debug, Clone, Default)]
pub struct SafeRegistry {
    registry: Option<Arc<ModuleRegistry>>,
}

impl SafeRegistry {
    pub fn is_available(&self) -> bool {
        self.registry.is_some()
    }

    /// Registers into the provider if there is one. Initialization errors
    /// are logged, not returned.
    pub async fn register_module(
        &self,
        name: ModuleName,
        module: Arc<dyn Module>,
        config: ModuleConfig,
    ) {
        match self.registry {
            Some(ref registry) => {
                if let Err(e) = registry.register_module(name, module, config).await {
                    warn!(%name, error = %e, "Ignoring module registration failure");
                }
            }
            None => debug!(%name, "No registry provider, skipping registration"),
        }
    }

    pub fn unregister_module(&self, name: ModuleName, module: &Arc<dyn Module>) -> bool {
        self.registry
            .as_ref()
            .map(|registry| registry.unregister_module(name, module))
            .unwrap_or(false)
    }

    pub fn get_module(&self, name: ModuleName) -> Option<Arc<dyn Module>> {
        self.registry.as_ref()?.get_module(name)
    }

    pub fn get_module_api(&self, name: ModuleName) -> Option<ModuleApi> {
        self.registry.as_ref()?.get_module_api(name)
    }

    pub fn api<S: ModuleSlot>(&self) -> Option<Arc<S::Api>> {
        self.registry.as_ref()?.api::<S>()
    }

    pub fn is_module_loaded(&self, name: ModuleName) -> bool {
        self.registry
            .as_ref()
            .map(|registry| registry.is_module_loaded(name))
            .unwrap_or(false)
    }

    /// Change receiver, if a registry is present.
    pub fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        self.registry.as_ref().map(|registry| registry.subscribe())
    }
}
