//! # Cross-Component Signals
//!
//! Typed, payload-less, fire-and-forget broadcasts within one process.
//!
//! ## Signal Flow
//! ```text
//! CartEngine ──publish(CartChanged)──► SignalBus<CartChanged>
//!                                          │
//!                     ┌────────────────────┼───────────────────┐
//!                     ▼                    ▼                   ▼
//!                cart badge           mini-cart            (anyone)
//!                refetch()            refetch()
//! ```
//!
//! Publishing with no subscribers is fine. Subscribers that fall behind
//! see `Lagged` and should treat it as "something changed".

use tokio::sync::broadcast;
use tracing::trace;

/// Default number of undelivered signals a subscriber may fall behind by.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 16;

/// The cart was replaced by a successful action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartChanged;

/// Broadcast bus for one signal type.
#[derive(Debug, Clone)]
pub struct SignalBus<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone + std::fmt::Debug> SignalBus<T> {
    /// Creates a bus that buffers up to `capacity` signals per subscriber.
    ///
    /// A zero capacity is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        SignalBus { tx }
    }

    /// Publishes a signal, returning how many subscribers will see it.
    pub fn publish(&self, signal: T) -> usize {
        let delivered = self.tx.send(signal).unwrap_or(0);
        trace!(delivered, "Signal published");
        delivered
    }

    /// Subscribes to signals published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone + std::fmt::Debug> Default for SignalBus<T> {
    fn default() -> Self {
        SignalBus::new(DEFAULT_SIGNAL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus: SignalBus<CartChanged> = SignalBus::default();
        assert_eq!(bus.publish(CartChanged), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus: SignalBus<CartChanged> = SignalBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(CartChanged), 2);
        assert_eq!(a.recv().await.unwrap(), CartChanged);
        assert_eq!(b.recv().await.unwrap(), CartChanged);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_signals() {
        let bus: SignalBus<CartChanged> = SignalBus::new(4);
        bus.publish(CartChanged);

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus: SignalBus<CartChanged> = SignalBus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(CartChanged);
        bus.publish(CartChanged);

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap(), CartChanged);
    }
}
