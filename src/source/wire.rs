//! HyperSync JSON request/response schema.
//!
//! Hex-encoded strings on the wire are parsed into typed values by the
//! `TryFrom` conversions at the bottom of this file; any malformed field
//! surfaces as [`IndexerError::InvalidResponse`].

use std::str::FromStr;

use alloy_primitives::{Address, B256, Bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LogBatch, LogPage, RawBlock, RawLog, RawTransaction};
use crate::error::IndexerError;

const BLOCK_FIELDS: &[&str] = &["number", "timestamp", "hash"];
const LOG_FIELDS: &[&str] = &[
    "block_number",
    "log_index",
    "transaction_index",
    "data",
    "address",
    "topic0",
    "topic1",
    "topic2",
    "topic3",
];
const TRANSACTION_FIELDS: &[&str] = &[
    "block_number",
    "transaction_index",
    "hash",
    "from",
    "to",
    "value",
    "input",
];

/// Body posted to `{url}/query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    /// First block, inclusive.
    pub from_block: u64,
    /// Last block, exclusive.
    pub to_block: u64,
    /// Log filters.
    pub logs: Vec<LogSelection>,
    /// Columns to return.
    pub field_selection: FieldSelection,
}

impl QueryRequest {
    /// Query for every log of `contract` in `[from_block, to_block)`.
    #[must_use]
    pub fn for_contract(contract: &Address, from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            logs: vec![LogSelection {
                address: vec![contract.to_string().to_ascii_lowercase()],
            }],
            field_selection: FieldSelection::default(),
        }
    }
}

/// Log filter by emitting address.
#[derive(Debug, Clone, Serialize)]
pub struct LogSelection {
    /// Contract addresses.
    pub address: Vec<String>,
}

/// Columns requested per table.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSelection {
    /// Block columns.
    pub block: &'static [&'static str],
    /// Log columns.
    pub log: &'static [&'static str],
    /// Transaction columns.
    pub transaction: &'static [&'static str],
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self {
            block: BLOCK_FIELDS,
            log: LOG_FIELDS,
            transaction: TRANSACTION_FIELDS,
        }
    }
}

/// Answer of `GET {url}/height`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HeightResponse {
    /// Current chain height known to the source.
    pub height: u64,
}

/// Answer of `POST {url}/query`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    /// Result batches.
    #[serde(default)]
    pub data: Vec<WireBatch>,
    /// Block to resume from.
    pub next_block: Option<u64>,
    /// Highest archived block.
    pub archive_height: Option<u64>,
}

/// One result batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireBatch {
    /// Logs.
    #[serde(default)]
    pub logs: Vec<WireLog>,
    /// Transactions.
    #[serde(default)]
    pub transactions: Vec<WireTransaction>,
    /// Blocks.
    #[serde(default)]
    pub blocks: Vec<WireBlock>,
}

/// Block row.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBlock {
    /// Block number.
    pub number: u64,
    /// Hex block hash.
    pub hash: Option<String>,
    /// Hex (or decimal) unix timestamp.
    pub timestamp: Option<String>,
}

/// Transaction row.
#[derive(Debug, Clone, Deserialize)]
pub struct WireTransaction {
    /// Block number.
    pub block_number: u64,
    /// Position within the block.
    pub transaction_index: u64,
    /// Hex transaction hash.
    pub hash: Option<String>,
    /// Hex sender address.
    pub from: Option<String>,
}

/// Log row.
#[derive(Debug, Clone, Deserialize)]
pub struct WireLog {
    /// Block number.
    pub block_number: u64,
    /// Position of the log within the block.
    pub log_index: u64,
    /// Position of the transaction within the block.
    pub transaction_index: u64,
    /// Hex emitting address.
    pub address: Option<String>,
    /// Hex data.
    pub data: Option<String>,
    /// Event signature hash.
    pub topic0: Option<String>,
    /// First indexed argument.
    pub topic1: Option<String>,
    /// Second indexed argument.
    pub topic2: Option<String>,
    /// Third indexed argument.
    pub topic3: Option<String>,
}

fn invalid(what: &str, value: &str) -> IndexerError {
    IndexerError::InvalidResponse(format!("malformed {what}: {value:?}"))
}

fn parse_hash(what: &str, raw: Option<&str>) -> Result<B256, IndexerError> {
    let raw = raw.ok_or_else(|| IndexerError::InvalidResponse(format!("missing {what}")))?;
    B256::from_str(raw).map_err(|_| invalid(what, raw))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, IndexerError> {
    let secs = match raw.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => raw.parse::<i64>(),
    }
    .map_err(|_| invalid("timestamp", raw))?;
    DateTime::from_timestamp(secs, 0).ok_or_else(|| invalid("timestamp", raw))
}

impl TryFrom<WireBlock> for RawBlock {
    type Error = IndexerError;

    fn try_from(wire: WireBlock) -> Result<Self, Self::Error> {
        let timestamp = wire
            .timestamp
            .as_deref()
            .ok_or_else(|| IndexerError::InvalidResponse(format!("block {} has no timestamp", wire.number)))
            .and_then(parse_timestamp)?;
        Ok(Self {
            number: wire.number,
            hash: parse_hash("block hash", wire.hash.as_deref())?,
            timestamp,
        })
    }
}

impl TryFrom<WireTransaction> for RawTransaction {
    type Error = IndexerError;

    fn try_from(wire: WireTransaction) -> Result<Self, Self::Error> {
        let from = match wire.from.as_deref() {
            Some(raw) if !raw.is_empty() => {
                Some(Address::from_str(raw).map_err(|_| invalid("sender", raw))?)
            }
            _ => None,
        };
        Ok(Self {
            block_number: wire.block_number,
            transaction_index: wire.transaction_index,
            hash: parse_hash("transaction hash", wire.hash.as_deref())?,
            from,
        })
    }
}

impl TryFrom<WireLog> for RawLog {
    type Error = IndexerError;

    fn try_from(wire: WireLog) -> Result<Self, Self::Error> {
        let address = wire
            .address
            .as_deref()
            .map(|raw| Address::from_str(raw).map_err(|_| invalid("log address", raw)))
            .transpose()?
            .unwrap_or_default();

        let mut topics = Vec::with_capacity(4);
        for raw in [&wire.topic0, &wire.topic1, &wire.topic2, &wire.topic3]
            .into_iter()
            .map_while(|t| t.as_deref())
        {
            topics.push(B256::from_str(raw).map_err(|_| invalid("topic", raw))?);
        }

        let data = match wire.data.as_deref() {
            Some(raw) if raw != "0x" && !raw.is_empty() => {
                Bytes::from_str(raw).map_err(|_| invalid("log data", raw))?
            }
            _ => Bytes::new(),
        };

        Ok(Self {
            block_number: wire.block_number,
            transaction_index: wire.transaction_index,
            log_index: wire.log_index,
            address,
            topics,
            data,
        })
    }
}

impl TryFrom<WireBatch> for LogBatch {
    type Error = IndexerError;

    fn try_from(wire: WireBatch) -> Result<Self, Self::Error> {
        Ok(Self {
            blocks: wire
                .blocks
                .into_iter()
                .map(RawBlock::try_from)
                .collect::<Result<_, _>>()?,
            transactions: wire
                .transactions
                .into_iter()
                .map(RawTransaction::try_from)
                .collect::<Result<_, _>>()?,
            logs: wire
                .logs
                .into_iter()
                .map(RawLog::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl TryFrom<QueryResponse> for LogPage {
    type Error = IndexerError;

    fn try_from(wire: QueryResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            batches: wire
                .data
                .into_iter()
                .map(LogBatch::try_from)
                .collect::<Result<_, _>>()?,
            next_block: wire.next_block,
            archive_height: wire.archive_height,
        })
    }
}
