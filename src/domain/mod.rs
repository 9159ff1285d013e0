//! Domain layer: projected entities, contract events, and notifications.
//!
//! This module contains the derived state model (listings, trades, the
//! append-only history), the closed set of decoded contract events, the
//! ingestion cursor, and the notification bus used to fan notifications out
//! to real-time transports.

pub mod cursor;
pub mod event;
pub mod history;
pub mod listing;
pub mod notification;
pub mod notification_bus;
pub mod trade;

pub use cursor::Cursor;
pub use event::{ContractEvent, ParsedEvent};
pub use history::{EventProvenance, HistoryEntry, HistoryStatus};
pub use listing::{Listing, ListingStatus, NftMetadata};
pub use notification::Notification;
pub use notification_bus::NotificationBus;
pub use trade::{Peer, Trade, TradeStatus};

use alloy_primitives::Address;

/// Canonical lower-case `0x`-prefixed form of an address.
///
/// Every address that reaches the store goes through this function (or
/// [`normalize_address`]) so equality comparisons are stable.
#[must_use]
pub fn address_key(address: &Address) -> String {
    address.to_string().to_ascii_lowercase()
}

/// Normalises an address received as text (trimmed, lower-cased).
#[must_use]
pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn address_key_is_lower_case() {
        let Ok(addr) = Address::from_str("0x5FbDB2315678afecb367f032d93F642f64180aa3") else {
            unreachable!("valid literal");
        };
        assert_eq!(
            address_key(&addr),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[test]
    fn normalize_trims_and_lowers() {
        assert_eq!(normalize_address("  0xABCdef \n"), "0xabcdef");
    }
}
