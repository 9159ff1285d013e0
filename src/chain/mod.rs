//! Authoritative on-chain reads.
//!
//! [`ChainState`] is the seam used by the reconciler to cross-check trades
//! against the contract and to resolve transaction senders. [`RpcChainClient`]
//! performs single JSON-RPC calls; [`RetryingChainState`] wraps any
//! implementation with the bounded retry policy.

pub mod retrying;
pub mod rpc;

pub use retrying::RetryingChainState;
pub use rpc::RpcChainClient;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use crate::domain::trade::TradeData;
use crate::error::IndexerError;

/// Read access to contract and transaction state.
#[async_trait]
pub trait ChainState: Send + Sync + std::fmt::Debug {
    /// Reads the trade's two sides from the contract.
    ///
    /// Peers are returned as stored on-chain; a zero address means the trade
    /// is not settled yet and callers must check [`TradeData::is_settled`].
    ///
    /// # Errors
    ///
    /// Transport, RPC or decoding failures.
    async fn trade_data(&self, trade_id: U256) -> Result<TradeData, IndexerError>;

    /// Resolves the sender of a transaction.
    ///
    /// # Errors
    ///
    /// Transport or RPC failures, or [`IndexerError::InvalidResponse`] when
    /// the node does not know the transaction.
    async fn transaction_initiator(&self, tx_hash: B256) -> Result<Address, IndexerError>;
}
