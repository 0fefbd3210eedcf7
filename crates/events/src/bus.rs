//! Event publishing/subscription abstraction (mechanics only).
//!
//! The inventory coordinator publishes one envelope per domain event **after** the
//! owning transaction has committed. From the coordinator's point of view publication
//! is fire-and-forget:
//!
//! - **Transport-agnostic**: in-memory channels, Redis pub/sub, a broker, ...
//! - **No delivery guarantee**: a failed publish is logged, never retried, and never
//!   rolls back the committed state change
//! - **No persistence**: the ledger (records + stock movements) is the source of truth
//!
//! Consumers that need completeness (analytics ingestion, audits) should read the
//! stock movement trail instead of relying on the bus.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// Receiving end of a bus: one copy of every message published after `subscribe()`.
///
/// A low-stock notifier, for example, filters the stream by event name:
///
/// ```ignore
/// let subscription = bus.subscribe();
/// while let Ok(envelope) = subscription.recv() {
///     if envelope.event_type() == "inventory.low_stock" {
///         notify_purchasing(envelope.payload());
///     }
/// }
/// ```
///
/// Meant for a single consuming thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every message that is already queued, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
///
/// ```text
/// Coordinator → Ledger (commit) → EventBus (publish) → Consumers
///                                                          ├─ notifications
///                                                          └─ analytics ingestion
/// ```
///
/// `publish()` may fail (bus closed, network error). The caller decides what a
/// failure means; the inventory coordinator only logs it.
///
/// Implementations must be `Send + Sync`: publishes happen from many request tasks
/// at once.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn drain_returns_queued_messages_without_blocking() {
        let (tx, rx) = mpsc::channel();
        let subscription = Subscription::new(rx);

        assert!(subscription.drain().is_empty());
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(subscription.drain(), vec![1, 2]);
        assert!(subscription.try_recv().is_err());
    }

    #[test]
    fn recv_timeout_reports_disconnect() {
        let (tx, rx) = mpsc::channel::<u8>();
        let subscription = Subscription::new(rx);
        drop(tx);
        assert_eq!(
            subscription.recv_timeout(Duration::from_millis(10)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }
}
