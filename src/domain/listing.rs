//! Marketplace listings and their embedded NFT metadata.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use bigdecimal::BigDecimal;
use bigdecimal::num_bigint::{BigInt, Sign};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::EventProvenance;
use crate::error::IndexerError;

/// Decimal places between wei and ether.
const WEI_SCALE: i64 = 18;

/// Lifecycle state of a listing.
///
/// `Created` is the only non-terminal state; a listing moves forward to
/// exactly one of `Removed` or `Sold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Open for purchase.
    Created,
    /// Withdrawn by the seller.
    Removed,
    /// Purchased by a buyer.
    Sold,
}

impl ListingStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Removed => "removed",
            Self::Sold => "sold",
        }
    }

    /// Returns `true` if moving from `self` to `next` is a forward move.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Removed) | (Self::Created, Self::Sold)
        )
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "removed" => Ok(Self::Removed),
            "sold" => Ok(Self::Sold),
            other => Err(IndexerError::Persistence(format!(
                "unknown listing status {other:?}"
            ))),
        }
    }
}

/// Display metadata for the listed token, filled from the enrichment
/// collaborator. Every field except the identifiers may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NftMetadata {
    /// Token id.
    pub token_id: U256,
    /// NFT contract (lower case).
    pub contract_address: String,
    /// Token standard, e.g. `erc721`.
    pub kind: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Last known market price in ether.
    pub last_price: Option<BigDecimal>,
    /// When the metadata was last fetched.
    pub last_updated: Option<DateTime<Utc>>,
}

impl NftMetadata {
    /// Metadata with identifiers only.
    #[must_use]
    pub fn empty(contract_address: &str, token_id: U256) -> Self {
        Self {
            token_id,
            contract_address: contract_address.to_string(),
            ..Self::default()
        }
    }
}

/// A projected listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// On-chain listing id (unique).
    pub listing_id: U256,
    /// NFT contract (lower case).
    pub contract_address: String,
    /// Token id within the contract.
    pub token_id: U256,
    /// Seller (lower case).
    pub seller_address: String,
    /// Buyer (lower case), set once sold.
    pub buyer_address: Option<String>,
    /// Asking price in ether.
    pub price: BigDecimal,
    /// Current status.
    pub status: ListingStatus,
    /// Embedded token metadata.
    pub metadata: NftMetadata,
    /// Coordinates of the `ListingCreated` log.
    pub created_from: EventProvenance,
}

/// Converts a wei amount into an exact ether decimal.
#[must_use]
pub fn wei_to_ether(wei: U256) -> BigDecimal {
    let digits = BigInt::from_bytes_be(Sign::Plus, &wei.to_be_bytes::<32>());
    BigDecimal::new(digits, WEI_SCALE)
}

/// Renders an ether amount without trailing zeros.
#[must_use]
pub fn format_ether(amount: &BigDecimal) -> String {
    let rendered = amount.with_scale(WEI_SCALE).to_string();
    if rendered.contains('.') && !rendered.contains(['e', 'E']) {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_forward_only() {
        use ListingStatus::{Created, Removed, Sold};
        assert!(Created.can_transition_to(Removed));
        assert!(Created.can_transition_to(Sold));
        assert!(!Removed.can_transition_to(Sold));
        assert!(!Sold.can_transition_to(Removed));
        assert!(!Removed.can_transition_to(Created));
        assert!(!Created.can_transition_to(Created));
    }

    #[test]
    fn status_parses_storage_form() {
        let Ok(status) = "sold".parse::<ListingStatus>() else {
            panic!("sold should parse");
        };
        assert_eq!(status, ListingStatus::Sold);
        assert!("open".parse::<ListingStatus>().is_err());
    }

    #[test]
    fn one_ether_in_wei() {
        let wei = U256::from(1_000_000_000_000_000_000_u128);
        let Ok(expected) = "1.0".parse::<BigDecimal>() else {
            panic!("literal");
        };
        assert_eq!(wei_to_ether(wei), expected);
        assert_eq!(format_ether(&wei_to_ether(wei)), "1");
    }

    #[test]
    fn fractional_wei_is_exact() {
        let price = wei_to_ether(U256::from(1_500_000_000_000_001_u128));
        assert_eq!(format_ether(&price), "0.001500000000000001");
    }

    #[test]
    fn max_u256_does_not_overflow() {
        let price = wei_to_ether(U256::MAX);
        assert!(price > BigDecimal::from(0));
    }
}
