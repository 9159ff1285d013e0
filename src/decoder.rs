//! Raw log to [`ContractEvent`] decoding.
//!
//! [`EventDecoder`] holds a registry keyed by the keccak-256 hash of each
//! event's canonical signature (`topic0`). Logs whose `topic0` is not
//! registered are foreign to the marketplace and are ignored; logs that match
//! a signature but fail to decode are reported as [`IndexerError::Decode`]
//! so the caller can skip them with a warning.

use std::collections::HashMap;

use alloy_primitives::B256;
use alloy_sol_types::SolEvent;

use crate::abi;
use crate::domain::ContractEvent;
use crate::error::IndexerError;

type DecodeFn = fn(&[B256], &[u8]) -> Result<ContractEvent, alloy_sol_types::Error>;

/// Signature-hash keyed decoder for the marketplace events.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    registry: HashMap<B256, (&'static str, DecodeFn)>,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDecoder {
    /// Builds the decoder with every supported event registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry: HashMap<B256, (&'static str, DecodeFn)> = HashMap::new();
        registry.insert(
            abi::ListingCreated::SIGNATURE_HASH,
            (abi::ListingCreated::SIGNATURE, decode_listing_created),
        );
        registry.insert(
            abi::ListingRemoved::SIGNATURE_HASH,
            (abi::ListingRemoved::SIGNATURE, decode_listing_removed),
        );
        registry.insert(
            abi::ListingSold::SIGNATURE_HASH,
            (abi::ListingSold::SIGNATURE, decode_listing_sold),
        );
        registry.insert(
            abi::TradeCreated::SIGNATURE_HASH,
            (abi::TradeCreated::SIGNATURE, decode_trade_created),
        );
        registry.insert(
            abi::TradeAccepted::SIGNATURE_HASH,
            (abi::TradeAccepted::SIGNATURE, decode_trade_accepted),
        );
        registry.insert(
            abi::TradeRejected::SIGNATURE_HASH,
            (abi::TradeRejected::SIGNATURE, decode_trade_rejected),
        );
        registry.insert(
            abi::TradeCompleted::SIGNATURE_HASH,
            (abi::TradeCompleted::SIGNATURE, decode_trade_completed),
        );
        Self { registry }
    }

    /// Decodes one raw log.
    ///
    /// Returns `Ok(None)` when the log has no topics or its `topic0` is not
    /// registered.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Decode`] when the signature matches but the
    /// topics or data are malformed.
    pub fn decode(&self, topics: &[B256], data: &[u8]) -> Result<Option<ContractEvent>, IndexerError> {
        let Some(topic0) = topics.first() else {
            return Ok(None);
        };
        let Some((signature, decode)) = self.registry.get(topic0) else {
            return Ok(None);
        };
        decode(topics, data)
            .map(Some)
            .map_err(|e| IndexerError::Decode(format!("{signature}: {e}")))
    }
}

fn decode_listing_created(topics: &[B256], data: &[u8]) -> Result<ContractEvent, alloy_sol_types::Error> {
    let ev = abi::ListingCreated::decode_raw_log(topics.iter().copied(), data, true)?;
    Ok(ContractEvent::ListingCreated {
        listing_id: ev.id,
        nft_contract: ev.nftContract,
        token_id: ev.tokenId,
        seller: ev.seller,
        price: ev.price,
    })
}

fn decode_listing_removed(topics: &[B256], data: &[u8]) -> Result<ContractEvent, alloy_sol_types::Error> {
    let ev = abi::ListingRemoved::decode_raw_log(topics.iter().copied(), data, true)?;
    Ok(ContractEvent::ListingRemoved {
        listing_id: ev.id,
        owner: ev.owner,
    })
}

fn decode_listing_sold(topics: &[B256], data: &[u8]) -> Result<ContractEvent, alloy_sol_types::Error> {
    let ev = abi::ListingSold::decode_raw_log(topics.iter().copied(), data, true)?;
    Ok(ContractEvent::ListingSold {
        listing_id: ev.id,
        buyer: ev.buyer,
    })
}

fn decode_trade_created(topics: &[B256], data: &[u8]) -> Result<ContractEvent, alloy_sol_types::Error> {
    let ev = abi::TradeCreated::decode_raw_log(topics.iter().copied(), data, true)?;
    Ok(ContractEvent::TradeCreated {
        trade_id: ev.tradeId,
        from: ev.from,
        to: ev.to,
    })
}

fn decode_trade_accepted(topics: &[B256], data: &[u8]) -> Result<ContractEvent, alloy_sol_types::Error> {
    let ev = abi::TradeAccepted::decode_raw_log(topics.iter().copied(), data, true)?;
    Ok(ContractEvent::TradeAccepted { trade_id: ev.tradeId })
}

fn decode_trade_rejected(topics: &[B256], data: &[u8]) -> Result<ContractEvent, alloy_sol_types::Error> {
    let ev = abi::TradeRejected::decode_raw_log(topics.iter().copied(), data, true)?;
    Ok(ContractEvent::TradeRejected { trade_id: ev.tradeId })
}

fn decode_trade_completed(topics: &[B256], data: &[u8]) -> Result<ContractEvent, alloy_sol_types::Error> {
    let ev = abi::TradeCompleted::decode_raw_log(topics.iter().copied(), data, true)?;
    Ok(ContractEvent::TradeCompleted { trade_id: ev.tradeId })
}
