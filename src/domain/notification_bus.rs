//! Broadcast channel for notifications.
//!
//! [`NotificationBus`] wraps a [`tokio::sync::broadcast`] channel. Every
//! stored [`Notification`] is published on the bus so a real-time transport
//! can subscribe and push it to connected clients.

use tokio::sync::broadcast;

use super::Notification;

/// Broadcast bus for [`Notification`]s.
///
/// When the ring buffer is full, the oldest notifications are dropped for
/// lagging receivers.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl NotificationBus {
    /// Creates a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a notification to all subscribers.
    ///
    /// Returns the number of receivers reached; zero when nobody listens.
    pub fn publish(&self, notification: Notification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }

    /// Creates a receiver for all future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::HistoryStatus;

    fn make(user: &str) -> Notification {
        Notification::new(user, HistoryStatus::ListingCreated, "Listing created", "body")
    }

    #[test]
    fn publish_without_receivers_returns_zero() {
        let bus = NotificationBus::new(8);
        assert_eq!(bus.publish(make("0xa")), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_the_same_notification() {
        let bus = NotificationBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(make("0xA")), 2);

        let Ok(n1) = rx1.recv().await else {
            panic!("rx1 failed");
        };
        let Ok(n2) = rx2.recv().await else {
            panic!("rx2 failed");
        };
        assert_eq!(n1.id, n2.id);
        assert_eq!(n1.user_address, "0xa");
    }

    #[test]
    fn receiver_count_tracks_subscribers() {
        let bus = NotificationBus::new(8);
        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);
        drop(rx);
        assert_eq!(bus.receiver_count(), 0);
    }
}
