//! Peer-to-peer trades.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use serde::Serialize;

use super::{EventProvenance, address_key, normalize_address};
use crate::error::IndexerError;

/// Lifecycle state of a trade.
///
/// ```text
/// Created ──► Accepted ──► Completed
///    │  └──────────────────────▲
///    └──► Rejected
/// ```
///
/// `Received` is the counterparty's view of `Created` and behaves like it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    /// Proposed by the initiator.
    Created,
    /// Proposal as seen by the counterparty.
    Received,
    /// Counterparty accepted.
    Accepted,
    /// Counterparty rejected (terminal).
    Rejected,
    /// Settled on-chain (terminal).
    Completed,
}

impl TradeStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Received => "received",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` if moving from `self` to `next` is a forward move.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Created | Self::Received,
                Self::Accepted | Self::Rejected | Self::Completed
            ) | (Self::Accepted, Self::Completed)
        )
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "received" => Ok(Self::Received),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            other => Err(IndexerError::Persistence(format!(
                "unknown trade status {other:?}"
            ))),
        }
    }
}

/// One side of a trade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Peer {
    /// Counterparty address (lower case).
    pub address: String,
    /// Token ids offered by this side.
    pub token_ids: Vec<U256>,
    /// NFT contracts of the offered tokens (lower case), parallel to `token_ids`.
    pub nft_contracts: Vec<String>,
}

impl Peer {
    /// Builds a peer from on-chain values, normalising addresses.
    #[must_use]
    pub fn from_chain(user: &Address, token_ids: Vec<U256>, nft_contracts: &[Address]) -> Self {
        Self {
            address: address_key(user),
            token_ids,
            nft_contracts: nft_contracts.iter().map(address_key).collect(),
        }
    }

    /// Returns `true` if the peer address is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        normalize_address(&self.address) == address_key(&Address::ZERO)
    }
}

/// Authoritative trade data read from the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeData {
    /// Initiator side.
    pub from: Peer,
    /// Counterparty side.
    pub to: Peer,
    /// Contract-side activity flag.
    pub is_active: bool,
}

impl TradeData {
    /// A trade is settled on-chain once both peers are non-zero.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.from.is_zero() && !self.to.is_zero()
    }
}

/// A projected trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trade {
    /// On-chain trade id (unique).
    pub trade_id: U256,
    /// Listings bundled into the trade; not carried by the creation event.
    pub listing_ids: Vec<U256>,
    /// Initiator side.
    pub from: Peer,
    /// Counterparty side.
    pub to: Peer,
    /// Current status.
    pub status: TradeStatus,
    /// Coordinates of the `TradeCreated` log.
    pub created_from: EventProvenance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_state_machine() {
        use TradeStatus::{Accepted, Completed, Created, Received, Rejected};
        assert!(Created.can_transition_to(Accepted));
        assert!(Created.can_transition_to(Rejected));
        assert!(Created.can_transition_to(Completed));
        assert!(Received.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Completed));

        assert!(!Accepted.can_transition_to(Rejected));
        assert!(!Accepted.can_transition_to(Created));
        assert!(!Completed.can_transition_to(Accepted));
        assert!(!Rejected.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn zero_peer_is_not_settled() {
        let real = Peer::from_chain(&Address::repeat_byte(0xAB), vec![U256::from(1)], &[
            Address::repeat_byte(0xCD),
        ]);
        let zero = Peer::from_chain(&Address::ZERO, Vec::new(), &[]);
        assert_eq!(real.address, "0xabababababababababababababababababababab");
        assert_eq!(real.nft_contracts, vec![
            "0xcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcdcd".to_string()
        ]);

        let settled = TradeData {
            from: real.clone(),
            to: real.clone(),
            is_active: true,
        };
        assert!(settled.is_settled());

        let pending = TradeData {
            from: zero,
            to: real,
            is_active: true,
        };
        assert!(!pending.is_settled());
    }
}
