//! Notification delivery.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{HistoryStatus, Notification, NotificationBus};
use crate::error::IndexerError;
use crate::persistence::Store;

/// Delivers one notification to one user.
///
/// Delivery is best-effort: the reconciler logs failures and moves on.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Sends `title` / `body` to `user_address`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Notification`] or a storage error when the
    /// notification could not be recorded.
    async fn notify(
        &self,
        user_address: &str,
        status: HistoryStatus,
        title: &str,
        body: &str,
    ) -> Result<(), IndexerError>;
}

/// Stores each notification, then publishes it on the [`NotificationBus`].
#[derive(Debug, Clone)]
pub struct PersistingNotifier {
    store: Arc<dyn Store>,
    bus: NotificationBus,
}

impl PersistingNotifier {
    /// Creates a notifier writing through `store` and publishing on `bus`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, bus: NotificationBus) -> Self {
        Self { store, bus }
    }
}

#[async_trait]
impl Notifier for PersistingNotifier {
    async fn notify(
        &self,
        user_address: &str,
        status: HistoryStatus,
        title: &str,
        body: &str,
    ) -> Result<(), IndexerError> {
        let notification = Notification::new(user_address, status, title, body);
        self.store.save_notification(&notification).await?;
        let receivers = self.bus.publish(notification);
        tracing::debug!(user = user_address, %status, receivers, "notification sent");
        Ok(())
    }
}
