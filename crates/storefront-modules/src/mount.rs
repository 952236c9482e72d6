//! # Module Mount
//!
//! Registers a feature module exactly once per mounted instance.
//!
//! ```text
//!   render() ─┬─ first call ──► registry.register_module(..)  → true
//!             └─ later calls ─► nothing                       → false
//!   unmount() ──► module.destroy(), entry removed if still ours
//! ```
//!
//! Registration goes through the safe accessor, so a feature mounted without
//! a registry above it still renders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::module::{Module, ModuleConfig};
use crate::registry::SafeRegistry;

/// One mounted feature module.
pub struct ModuleMount {
    registry: SafeRegistry,
    module: Arc<dyn Module>,
    config: ModuleConfig,
    registered: AtomicBool,
}

impl ModuleMount {
    pub fn new(registry: SafeRegistry, module: Arc<dyn Module>, config: ModuleConfig) -> Self {
        ModuleMount {
            registry,
            module,
            config,
            registered: AtomicBool::new(false),
        }
    }

    /// Registers the module on the first call only.
    ///
    /// Returns true if this call performed the registration.
    pub async fn render(&self) -> bool {
        if self.registered.swap(true, Ordering::SeqCst) {
            return false;
        }

        let name = self.config.name;
        debug!(%name, "Mounting module");
        self.registry
            .register_module(name, self.module.clone(), self.config.clone())
            .await;
        true
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// The mounted module.
    pub fn module(&self) -> &Arc<dyn Module> {
        &self.module
    }

    /// Runs the module's cleanup and drops its registry entry.
    pub async fn unmount(self) {
        let name = self.config.name;
        if !self.registered.load(Ordering::SeqCst) {
            debug!(%name, "Unmounting module that never rendered");
            return;
        }

        self.module.destroy().await;
        self.registry.unregister_module(name, &self.module);
        debug!(%name, "Module unmounted");
    }
}

impl std::fmt::Debug for ModuleMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleMount")
            .field("name", &self.config.name)
            .field("registered", &self.is_registered())
            .finish()
    }
}
