//! Fan-out of dashboard events to live subscribers.
//!
//! Each subscriber owns a bounded queue. Publishing never waits: a subscriber
//! whose queue is full or closed is dropped from the set, and the remaining
//! subscribers still receive the event.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use taskdeck_core::event::DashboardEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    sender: mpsc::Sender<DashboardEvent>,
}

/// Receiving end handed to a connection.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<DashboardEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next event. Returns `None` once the broadcaster has
    /// dropped this subscriber.
    pub async fn recv(&mut self) -> Option<DashboardEvent> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<DashboardEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Observer set with best-effort delivery and self-pruning on failure.
pub struct Broadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Broadcaster {
    /// Creates a broadcaster whose subscribers queue up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Adds a subscriber and queues `initial` for it before any later event.
    pub fn subscribe(&self, initial: Vec<DashboardEvent>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer.max(initial.len()));

        let mut subscribers = self.lock();
        for event in initial {
            // Capacity covers the initial batch, so this cannot fail.
            let _ = sender.try_send(event);
        }
        subscribers.push(Subscriber { id, sender });
        tracing::debug!(subscriber_id = id, total = subscribers.len(), "subscriber added");

        Subscription { id, receiver }
    }

    /// Removes a subscriber. Removing an unknown or already removed id is a no-op.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        if removed {
            tracing::debug!(subscriber_id = id, total = subscribers.len(), "subscriber removed");
        }
        removed
    }

    /// Delivers `event` to every subscriber, pruning the ones that cannot take it.
    pub fn publish(&self, event: DashboardEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|subscriber| match subscriber.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    subscriber_id = subscriber.id,
                    "subscriber queue full; dropping subscriber"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber_id = subscriber.id, "subscriber disconnected");
                false
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        // A panic while holding the lock leaves the list itself consistent.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_core::event::Notification;

    fn note(message: &str) -> DashboardEvent {
        DashboardEvent::Notification(Notification::success("test", message))
    }

    #[tokio::test]
    async fn test_initial_events_arrive_first() {
        let broadcaster = Broadcaster::new(4);
        let mut sub = broadcaster.subscribe(vec![note("snapshot")]);
        broadcaster.publish(note("live"));

        assert_eq!(sub.recv().await, Some(note("snapshot")));
        assert_eq!(sub.recv().await, Some(note("live")));
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let broadcaster = Broadcaster::new(4);
        let mut a = broadcaster.subscribe(Vec::new());
        let mut b = broadcaster.subscribe(Vec::new());

        broadcaster.publish(note("hello"));

        assert_eq!(a.recv().await, Some(note("hello")));
        assert_eq!(b.recv().await, Some(note("hello")));
    }

    #[test]
    fn test_closed_subscriber_is_pruned_without_affecting_others() {
        let broadcaster = Broadcaster::new(4);
        let dropped = broadcaster.subscribe(Vec::new());
        let mut kept = broadcaster.subscribe(Vec::new());
        drop(dropped);

        broadcaster.publish(note("after drop"));

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Some(note("after drop")));
    }

    #[test]
    fn test_full_subscriber_is_pruned() {
        let broadcaster = Broadcaster::new(1);
        let mut slow = broadcaster.subscribe(Vec::new());

        broadcaster.publish(note("one"));
        broadcaster.publish(note("two"));

        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(slow.try_recv(), Some(note("one")));
        assert_eq!(slow.try_recv(), None);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let broadcaster = Broadcaster::new(4);
        let sub = broadcaster.subscribe(Vec::new());

        assert!(broadcaster.unsubscribe(sub.id()));
        assert!(!broadcaster.unsubscribe(sub.id()));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let broadcaster = Broadcaster::default();
        broadcaster.publish(note("nobody listening"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
