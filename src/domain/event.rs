//! Decoded marketplace contract events.

use alloy_primitives::{Address, B256, U256};
use serde::Serialize;

use super::EventProvenance;

/// The closed set of contract events the indexer understands.
///
/// Adding a variant forces every consumer's `match` to handle it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContractEvent {
    /// A seller opened a listing.
    ListingCreated {
        /// Listing id.
        listing_id: U256,
        /// NFT contract of the listed token.
        nft_contract: Address,
        /// Listed token id.
        token_id: U256,
        /// Seller.
        seller: Address,
        /// Asking price in wei.
        price: U256,
    },
    /// The seller withdrew a listing.
    ListingRemoved {
        /// Listing id.
        listing_id: U256,
        /// Owner that removed it.
        owner: Address,
    },
    /// A buyer purchased a listing.
    ListingSold {
        /// Listing id.
        listing_id: U256,
        /// Buyer.
        buyer: Address,
    },
    /// A trade was proposed.
    TradeCreated {
        /// Trade id.
        trade_id: U256,
        /// Initiator.
        from: Address,
        /// Counterparty.
        to: Address,
    },
    /// A trade was accepted.
    TradeAccepted {
        /// Trade id.
        trade_id: U256,
    },
    /// A trade was rejected.
    TradeRejected {
        /// Trade id.
        trade_id: U256,
    },
    /// A trade was settled.
    TradeCompleted {
        /// Trade id.
        trade_id: U256,
    },
}

impl ContractEvent {
    /// Event name as declared in the contract ABI.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ListingCreated { .. } => "ListingCreated",
            Self::ListingRemoved { .. } => "ListingRemoved",
            Self::ListingSold { .. } => "ListingSold",
            Self::TradeCreated { .. } => "TradeCreated",
            Self::TradeAccepted { .. } => "TradeAccepted",
            Self::TradeRejected { .. } => "TradeRejected",
            Self::TradeCompleted { .. } => "TradeCompleted",
        }
    }
}

/// A decoded event together with the coordinates of the log it came from.
///
/// Lives only for the duration of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    /// The decoded event.
    pub event: ContractEvent,
    /// Block, transaction and log coordinates.
    pub provenance: EventProvenance,
    /// Position of the transaction within its block.
    pub transaction_index: u64,
    /// Sender of the emitting transaction (lower case), when known.
    ///
    /// Diagnostic context only; no state transition depends on it.
    pub initiator: Option<String>,
    /// Raw topics of the log.
    pub topics: Vec<B256>,
}
