//! Per-user notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{HistoryStatus, normalize_address};

/// A notification addressed to one user.
///
/// Created unread; only the (external) query API flips `is_read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Row identifier.
    pub id: Uuid,
    /// Recipient (lower case).
    pub user_address: String,
    /// Transition the notification reports.
    pub status: HistoryStatus,
    /// Short title.
    pub title: String,
    /// Human-readable body.
    pub body: String,
    /// Read flag.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates an unread notification.
    #[must_use]
    pub fn new(user_address: &str, status: HistoryStatus, title: &str, body: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_address: normalize_address(user_address),
            status,
            title: title.to_string(),
            body: body.to_string(),
            is_read: false,
            created_at: Utc::now(),
        }
    }
}
