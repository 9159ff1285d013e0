//! Append-only audit log of state transitions.
//!
//! Every mutation of a [`super::Listing`] or [`super::Trade`] is paired with
//! one [`HistoryEntry`] per affected user, carrying the block and
//! transaction coordinates of the log that caused it. History rows are never
//! updated or deleted.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::normalize_address;
use crate::error::IndexerError;

/// Status recorded for a user in a history row.
///
/// Listing sales and trade creation are two-sided: the seller sees
/// `ListingSold` while the buyer sees `ListingBought`, the initiator sees
/// `TradeCreated` while the counterparty sees `TradeReceived`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    /// Seller opened a listing.
    ListingCreated,
    /// Seller withdrew a listing.
    ListingRemoved,
    /// Seller's listing was sold.
    ListingSold,
    /// Buyer purchased a listing.
    ListingBought,
    /// Initiator proposed a trade.
    TradeCreated,
    /// Counterparty received a trade proposal.
    TradeReceived,
    /// Trade was accepted.
    TradeAccepted,
    /// Trade was rejected.
    TradeRejected,
    /// Trade settled on-chain.
    TradeCompleted,
}

impl HistoryStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListingCreated => "listing_created",
            Self::ListingRemoved => "listing_removed",
            Self::ListingSold => "listing_sold",
            Self::ListingBought => "listing_bought",
            Self::TradeCreated => "trade_created",
            Self::TradeReceived => "trade_received",
            Self::TradeAccepted => "trade_accepted",
            Self::TradeRejected => "trade_rejected",
            Self::TradeCompleted => "trade_completed",
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryStatus {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "listing_created" => Ok(Self::ListingCreated),
            "listing_removed" => Ok(Self::ListingRemoved),
            "listing_sold" => Ok(Self::ListingSold),
            "listing_bought" => Ok(Self::ListingBought),
            "trade_created" => Ok(Self::TradeCreated),
            "trade_received" => Ok(Self::TradeReceived),
            "trade_accepted" => Ok(Self::TradeAccepted),
            "trade_rejected" => Ok(Self::TradeRejected),
            "trade_completed" => Ok(Self::TradeCompleted),
            other => Err(IndexerError::Persistence(format!(
                "unknown history status {other:?}"
            ))),
        }
    }
}

/// On-chain coordinates of the log that caused a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventProvenance {
    /// Block number.
    pub block_number: u64,
    /// Block hash (`0x`-prefixed, lower case).
    pub block_hash: String,
    /// Transaction hash (`0x`-prefixed, lower case).
    pub transaction_hash: String,
    /// Position of the log within its block.
    pub log_index: u64,
    /// Block timestamp.
    pub timestamp: DateTime<Utc>,
}

/// One immutable audit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Row identifier.
    pub id: Uuid,
    /// User the row belongs to (lower case).
    pub user_address: String,
    /// Listing concerned, if any.
    pub listing_id: Option<U256>,
    /// Trade concerned, if any.
    pub trade_id: Option<U256>,
    /// Transition recorded for this user.
    pub status: HistoryStatus,
    /// Source log coordinates.
    pub provenance: EventProvenance,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// History row for a listing transition.
    #[must_use]
    pub fn for_listing(
        user_address: &str,
        listing_id: U256,
        status: HistoryStatus,
        provenance: &EventProvenance,
    ) -> Self {
        Self::new(user_address, Some(listing_id), None, status, provenance)
    }

    /// History row for a trade transition.
    #[must_use]
    pub fn for_trade(
        user_address: &str,
        trade_id: U256,
        status: HistoryStatus,
        provenance: &EventProvenance,
    ) -> Self {
        Self::new(user_address, None, Some(trade_id), status, provenance)
    }

    fn new(
        user_address: &str,
        listing_id: Option<U256>,
        trade_id: Option<U256>,
        status: HistoryStatus,
        provenance: &EventProvenance,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_address: normalize_address(user_address),
            listing_id,
            trade_id,
            status,
            provenance: provenance.clone(),
            created_at: Utc::now(),
        }
    }

    /// Natural key used to reject replays of the same log for the same user.
    #[must_use]
    pub fn dedup_key(&self) -> (String, u64, String, HistoryStatus) {
        (
            self.provenance.transaction_hash.clone(),
            self.provenance.log_index,
            self.user_address.clone(),
            self.status,
        )
    }
}
