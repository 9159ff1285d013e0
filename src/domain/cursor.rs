//! Ingestion progress watermark.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The persisted ingestion position.
///
/// `last_processed_block` holds the block the next poll requests logs from
/// (the log source's `next_block` of the last fully reconciled page). The
/// value never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cursor {
    /// Next block to request from the log source.
    pub last_processed_block: u64,
    /// Time of the last advance.
    pub updated_at: DateTime<Utc>,
}

impl Cursor {
    /// Creates a cursor at `block`, stamped now.
    #[must_use]
    pub fn at(block: u64) -> Self {
        Self {
            last_processed_block: block,
            updated_at: Utc::now(),
        }
    }

    /// Returns the block to advance to, or `None` when `candidate` would not
    /// move the cursor forward.
    #[must_use]
    pub const fn advance_target(&self, candidate: Option<u64>) -> Option<u64> {
        match candidate {
            Some(next) if next > self.last_processed_block => Some(next),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_only_forward() {
        let cursor = Cursor::at(100);
        assert_eq!(cursor.advance_target(Some(150)), Some(150));
        assert_eq!(cursor.advance_target(Some(100)), None);
        assert_eq!(cursor.advance_target(Some(99)), None);
        assert_eq!(cursor.advance_target(None), None);
    }
}
