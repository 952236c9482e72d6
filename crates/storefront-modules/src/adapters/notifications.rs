//! # Notification Module
//!
//! Registers a [`NotificationCenter`] under the notifications slot.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ModuleResult;
use crate::module::{Module, ModuleApi, ModuleConfig, ModuleName, NotificationApi};
use crate::notifications::NotificationCenter;

/// Notification feature module.
#[derive(Debug, Clone, Default)]
pub struct NotificationModule {
    center: NotificationCenter,
}

impl NotificationModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing center (e.g. one the toast UI already watches).
    pub fn with_center(center: NotificationCenter) -> Self {
        NotificationModule { center }
    }

    pub fn center(&self) -> &NotificationCenter {
        &self.center
    }

    pub fn config() -> ModuleConfig {
        ModuleConfig::new(ModuleName::Notifications)
            .with_public_api(["notify", "dismiss", "clear", "active"])
    }
}

#[async_trait]
impl Module for NotificationModule {
    async fn initialize(&self) -> ModuleResult<()> {
        Ok(())
    }

    fn public_api(&self) -> ModuleApi {
        ModuleApi::Notifications(Arc::new(self.center.clone()))
    }

    async fn destroy(&self) {
        self.center.clear();
    }
}
