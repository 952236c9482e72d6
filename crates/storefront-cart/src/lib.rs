//! # storefront-cart: Cart Synchronization Engine
//!
//! Keeps a locally cached cart consistent with a remote commerce backend,
//! persists the cart identifier across sessions, and tells the rest of the
//! process when the cart changed.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Engine Architecture                             │
//! │                                                                         │
//! │   UI / modules                                                          │
//! │       │  fetch_cart  add_to_cart  update_cart  remove_from_cart         │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         CartEngine                               │  │
//! │  │  watch<CartState> ──► subscribers (badge, mini-cart, page)       │  │
//! │  └────┬───────────────┬────────────────┬─────────────────┬──────────┘  │
//! │       │               │                │                 │             │
//! │       ▼               ▼                ▼                 ▼             │
//! │  RequestTransport  CartIdSlot      SignalBus         Telemetry         │
//! │  ├ HttpTransport   ├ FileStore     CartChanged       ├ Tracing         │
//! │  └ InMemoryBackend └ MemoryStore   (broadcast)       └ NoOp            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - `CartEngine` and its builder
//! - [`transport`] - Transport contract and normalized responses
//! - [`http`] - Storefront GraphQL client
//! - [`memory`] - In-process backend
//! - [`store`] - Durable key/value store and the cart id slot
//! - [`signal`] - `CartChanged` broadcast bus
//! - [`listener`] - Refetch-on-change task
//! - [`telemetry`] - Analytics sinks
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use storefront_cart::{CartEngine, InMemoryBackend, MemoryStore};
//!
//! # async fn demo() -> storefront_cart::CartResult<()> {
//! let engine = CartEngine::new(Arc::new(InMemoryBackend::new()), Arc::new(MemoryStore::new()));
//!
//! engine.fetch_cart().await;
//! let cart = engine.add_to_cart("variant-1", Some(2)).await?;
//! assert_eq!(cart.total_quantity, 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod listener;
pub mod memory;
pub mod signal;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use config::StorefrontConfig;
pub use engine::{CartEngine, CartEngineBuilder};
pub use error::{CartError, CartResult, ConfigError, TransportError, TransportResult};
pub use http::HttpTransport;
pub use listener::spawn_refetch_on_change;
pub use memory::InMemoryBackend;
pub use signal::{CartChanged, SignalBus};
pub use store::{CartIdSlot, FileStore, KeyValueStore, MemoryStore};
pub use telemetry::{NoOpTelemetry, Telemetry, TelemetryEvent, TracingTelemetry};
pub use transport::{Document, RequestTransport, TransportResponse};
