//! # Feature Module Adapters
//!
//! Wrap domain objects as registrable modules.
//!
//! - [`CartModule`] - cart engine
//! - [`NotificationModule`] - notification center

mod cart;
mod notifications;

pub use cart::{CartModule, CART_ROUTE};
pub use notifications::NotificationModule;
