//! # storefront-core: Pure Types for the Storefront State Layer
//!
//! This crate holds the data model shared by the cart synchronization engine
//! and the feature modules. It contains no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Storefront State Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    UI trees (cart, badge, toasts)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ capabilities                           │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            storefront-modules (registry + adapters)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            storefront-cart (sync engine, transport)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ storefront-core (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   money   │  │   types   │  │   error   │                  │   │
//! │  │   │   Money   │  │   Cart    │  │ CoreError │                  │   │
//! │  │   │ MoneyAmt  │  │ CartState │  │           │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO STORAGE                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Cart, cart lines, observable cart state, cart identifier
//! - [`money`] - Money in integer minor units, parsed from backend decimals
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::money::{Money, MoneyAmount};
//!
//! let price: Money = "19.99".parse().unwrap();
//! assert_eq!(price.minor_units(), 1999);
//!
//! let total = MoneyAmount::new(price, "USD");
//! assert_eq!(total.to_string(), "19.99 USD");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use money::{Money, MoneyAmount};
pub use types::*;
