//! Log source abstraction.
//!
//! A [`LogSource`] returns every log emitted by the monitored contract from a
//! starting block up to the confirmed tip, grouped in [`LogBatch`]es together
//! with the block and transaction records needed to build provenance. The
//! production implementation is [`HyperSyncClient`].

pub mod hypersync;
pub mod wire;

pub use hypersync::HyperSyncClient;

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::IndexerError;

/// Block header fields carried by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Block timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Transaction fields carried by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    /// Block number.
    pub block_number: u64,
    /// Position within the block.
    pub transaction_index: u64,
    /// Transaction hash.
    pub hash: B256,
    /// Sender, when the source returned it.
    pub from: Option<Address>,
}

/// One raw contract log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Block number.
    pub block_number: u64,
    /// Position of the transaction within the block.
    pub transaction_index: u64,
    /// Position of the log within the block.
    pub log_index: u64,
    /// Emitting contract.
    pub address: Address,
    /// Topics, `topic0` first.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed data.
    pub data: Bytes,
}

/// Logs plus the blocks and transactions they reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    /// Blocks referenced by `logs`.
    pub blocks: Vec<RawBlock>,
    /// Transactions referenced by `logs`.
    pub transactions: Vec<RawTransaction>,
    /// Logs in delivery order.
    pub logs: Vec<RawLog>,
}

impl LogBatch {
    /// Finds the block record for `number`.
    #[must_use]
    pub fn block(&self, number: u64) -> Option<&RawBlock> {
        self.blocks.iter().find(|b| b.number == number)
    }

    /// Finds the transaction record at (`block_number`, `transaction_index`).
    #[must_use]
    pub fn transaction(&self, block_number: u64, transaction_index: u64) -> Option<&RawTransaction> {
        self.transactions
            .iter()
            .find(|t| t.block_number == block_number && t.transaction_index == transaction_index)
    }
}

/// Result of one `get_logs` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPage {
    /// Batches in delivery order.
    pub batches: Vec<LogBatch>,
    /// Block to resume from; `None` when the source did not say.
    pub next_block: Option<u64>,
    /// Highest block the source has archived.
    pub archive_height: Option<u64>,
}

impl LogPage {
    /// A page with no logs and no resume point.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total number of logs across batches.
    #[must_use]
    pub fn log_count(&self) -> usize {
        self.batches.iter().map(|b| b.logs.len()).sum()
    }
}

/// Provider of confirmed contract logs.
#[async_trait]
pub trait LogSource: Send + Sync + std::fmt::Debug {
    /// Returns logs in `[from_block, tip - confirmation_depth)`.
    ///
    /// Returns an empty page when no new confirmed range exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the source is unreachable after retries or
    /// answers with a malformed payload.
    async fn get_logs(&self, from_block: u64) -> Result<LogPage, IndexerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(block_number: u64, transaction_index: u64) -> RawTransaction {
        RawTransaction {
            block_number,
            transaction_index,
            hash: B256::repeat_byte(u8::try_from(transaction_index).unwrap_or(0)),
            from: None,
        }
    }

    #[test]
    fn transaction_lookup_uses_block_and_index() {
        let batch = LogBatch {
            transactions: vec![tx(10, 0), tx(10, 1), tx(11, 0)],
            ..LogBatch::default()
        };
        assert_eq!(batch.transaction(10, 1).map(|t| t.hash), Some(B256::repeat_byte(1)));
        assert!(batch.transaction(12, 0).is_none());
    }

    #[test]
    fn log_count_sums_batches() {
        let log = RawLog {
            block_number: 1,
            transaction_index: 0,
            log_index: 0,
            address: Address::ZERO,
            topics: Vec::new(),
            data: Bytes::new(),
        };
        let page = LogPage {
            batches: vec![
                LogBatch {
                    logs: vec![log.clone(), log.clone()],
                    ..LogBatch::default()
                },
                LogBatch {
                    logs: vec![log],
                    ..LogBatch::default()
                },
            ],
            next_block: Some(2),
            archive_height: None,
        };
        assert_eq!(page.log_count(), 3);
        assert_eq!(LogPage::empty().log_count(), 0);
    }
}
