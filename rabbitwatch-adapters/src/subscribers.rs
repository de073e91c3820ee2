//! Multi-subscriber fan-out with disposable subscriptions.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// A registry of subscribers that all receive every emitted value.
///
/// Each [`Subscription`] owns the receiving half of its own unbounded
/// channel. Dropping the subscription disposes it; the registry forgets
/// closed subscribers on the next emit, so long-lived registries do not
/// accumulate dead listeners.
pub struct Subscribers<T> {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<T>>>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Self {
            senders: self.senders.clone(),
        }
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            senders: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().push(tx);
        Subscription { receiver: rx }
    }

    /// Deliver a value to every live subscriber.
    ///
    /// Returns the number of subscribers that received it.
    pub fn emit(&self, value: T) -> usize {
        let mut senders = self.lock();
        senders.retain(|tx| tx.send(value.clone()).is_ok());
        senders.len()
    }

    /// Number of registered subscribers, including ones dropped since the
    /// last emit.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<T>>> {
        // A panic while holding this lock cannot leave the Vec inconsistent.
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.senders.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("Subscribers").field("count", &count).finish()
    }
}

/// Handle to one subscription. Drop it to unsubscribe.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next value.
    ///
    /// Returns `None` once the registry has been dropped.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take the next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::new();
        while let Ok(value) = self.receiver.try_recv() {
            out.push(value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives() {
        let subs = Subscribers::new();
        let mut a = subs.subscribe();
        let mut b = subs.subscribe();

        assert_eq!(subs.emit(7u32), 2);
        assert_eq!(a.recv().await, Some(7));
        assert_eq!(b.recv().await, Some(7));
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let subs = Subscribers::new();
        let keep = subs.subscribe();
        let gone = subs.subscribe();
        assert_eq!(subs.len(), 2);

        drop(gone);
        assert_eq!(subs.emit("x".to_string()), 1);
        assert_eq!(subs.len(), 1);
        drop(keep);
    }

    #[test]
    fn drain_returns_in_order() {
        let subs = Subscribers::new();
        let mut sub = subs.subscribe();
        subs.emit(1);
        subs.emit(2);
        subs.emit(3);
        assert_eq!(sub.drain(), vec![1, 2, 3]);
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn recv_ends_when_registry_dropped() {
        let subs: Subscribers<u8> = Subscribers::new();
        let mut sub = subs.subscribe();
        drop(subs);
        assert_eq!(sub.recv().await, None);
    }
}
