//! # Refetch Listener
//!
//! Keeps an engine fresh when another component changes the cart.
//!
//! ```text
//!   engine A ──CartChanged──► SignalBus ──► listener(engine B) ──► B.refetch()
//! ```
//!
//! A lagged receiver refetches once and keeps going; a closed bus ends the
//! task.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::CartEngine;

/// Spawns a task that refetches `engine` on every `CartChanged` signal.
///
/// The task subscribes to the engine's own bus, so signals from any engine
/// sharing that bus (including `engine` itself) trigger a refetch. Abort the
/// returned handle to stop listening.
pub fn spawn_refetch_on_change(engine: CartEngine) -> JoinHandle<()> {
    let mut rx = engine.subscribe_changes();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(_) => {
                    debug!("CartChanged received, refetching");
                    engine.refetch().await;
                }
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "Refetch listener lagged, refetching once");
                    engine.refetch().await;
                }
                Err(RecvError::Closed) => {
                    info!("Signal bus closed, refetch listener stopping");
                    break;
                }
            }
        }
    })
}
