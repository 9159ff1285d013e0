//! Retry decorator for [`ChainState`] implementations.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use super::ChainState;
use crate::domain::trade::TradeData;
use crate::error::IndexerError;
use crate::retry::RetryPolicy;

/// Wraps any [`ChainState`] so transient failures are retried with backoff.
///
/// Permanent errors (reverts, malformed answers) are returned immediately.
#[derive(Debug)]
pub struct RetryingChainState<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: ChainState> RetryingChainState<C> {
    /// Wraps `inner` with `policy`.
    #[must_use]
    pub const fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<C: ChainState> ChainState for RetryingChainState<C> {
    async fn trade_data(&self, trade_id: U256) -> Result<TradeData, IndexerError> {
        self.policy
            .run("get_trade", || self.inner.trade_data(trade_id))
            .await
    }

    async fn transaction_initiator(&self, tx_hash: B256) -> Result<Address, IndexerError> {
        self.policy
            .run("get_transaction", || self.inner.transaction_initiator(tx_hash))
            .await
    }
}
