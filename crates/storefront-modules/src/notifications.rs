//! # Notification Center
//!
//! In-memory queue of shopper-facing messages ("Added to cart", ...).
//!
//! Only the queue lives here. How notifications stack, animate or time out
//! on screen is the UI's business; it watches [`NotificationCenter::subscribe`]
//! and calls `dismiss` when a toast goes away.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::module::NotificationApi;

/// Oldest notifications are dropped beyond this many.
pub const MAX_ACTIVE_NOTIFICATIONS: usize = 5;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

/// A posted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Shared notification queue. Clones share the queue.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    active: Arc<watch::Sender<Vec<Notification>>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        NotificationCenter {
            active: Arc::new(tx),
        }
    }

    /// Receiver notified whenever the queue changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.active.subscribe()
    }

    pub fn len(&self) -> usize {
        self.active.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.borrow().is_empty()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationApi for NotificationCenter {
    fn notify(&self, kind: NotificationKind, message: &str) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            kind,
            message: message.to_string(),
            created_at: Utc::now(),
        };
        let id = notification.id;
        debug!(%id, ?kind, text = message, "Notification posted");

        self.active.send_modify(|queue| {
            queue.push(notification);
            if queue.len() > MAX_ACTIVE_NOTIFICATIONS {
                let overflow = queue.len() - MAX_ACTIVE_NOTIFICATIONS;
                queue.drain(..overflow);
            }
        });
        id
    }

    fn dismiss(&self, id: Uuid) -> bool {
        self.active.send_if_modified(|queue| {
            let before = queue.len();
            queue.retain(|n| n.id != id);
            queue.len() != before
        })
    }

    fn clear(&self) {
        self.active.send_if_modified(|queue| {
            let had_any = !queue.is_empty();
            queue.clear();
            had_any
        });
    }

    fn active(&self) -> Vec<Notification> {
        self.active.borrow().clone()
    }
}
