//! Database row types and their conversion into domain values.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::numeric::{to_u64, to_u256, to_u256_list};
use crate::domain::{
    Cursor, EventProvenance, HistoryEntry, Listing, NftMetadata, Notification, Peer, Trade,
};
use crate::error::IndexerError;

fn log_index(raw: i64) -> Result<u64, IndexerError> {
    u64::try_from(raw).map_err(|_| IndexerError::Persistence(format!("negative log index {raw}")))
}

/// A row of the singleton `indexer_state` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CursorRow {
    /// Next block to request.
    pub last_processed_block: BigDecimal,
    /// Last advance time.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CursorRow> for Cursor {
    type Error = IndexerError;

    fn try_from(row: CursorRow) -> Result<Self, Self::Error> {
        Ok(Self {
            last_processed_block: to_u64(&row.last_processed_block)?,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `listings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    /// Listing id.
    pub listing_id: BigDecimal,
    /// NFT contract.
    pub contract_address: String,
    /// Token id.
    pub token_id: BigDecimal,
    /// Seller.
    pub seller_address: String,
    /// Buyer.
    pub buyer_address: Option<String>,
    /// Price in ether.
    pub price: BigDecimal,
    /// Status text.
    pub status: String,
    /// Metadata: token standard.
    pub metadata_kind: Option<String>,
    /// Metadata: name.
    pub metadata_name: Option<String>,
    /// Metadata: image URL.
    pub metadata_image_url: Option<String>,
    /// Metadata: description.
    pub metadata_description: Option<String>,
    /// Metadata: last market price.
    pub metadata_last_price: Option<BigDecimal>,
    /// Metadata: last refresh.
    pub metadata_last_updated: Option<DateTime<Utc>>,
    /// Creating log: block number.
    pub block_number: BigDecimal,
    /// Creating log: block hash.
    pub block_hash: String,
    /// Creating log: transaction hash.
    pub transaction_hash: String,
    /// Creating log: log index.
    pub log_index: i64,
    /// Creating log: block timestamp.
    pub block_timestamp: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = IndexerError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        let token_id = to_u256(&row.token_id)?;
        Ok(Self {
            listing_id: to_u256(&row.listing_id)?,
            metadata: NftMetadata {
                token_id,
                contract_address: row.contract_address.clone(),
                kind: row.metadata_kind,
                name: row.metadata_name,
                image_url: row.metadata_image_url,
                description: row.metadata_description,
                last_price: row.metadata_last_price,
                last_updated: row.metadata_last_updated,
            },
            contract_address: row.contract_address,
            token_id,
            seller_address: row.seller_address,
            buyer_address: row.buyer_address,
            price: row.price,
            status: row.status.parse()?,
            created_from: EventProvenance {
                block_number: to_u64(&row.block_number)?,
                block_hash: row.block_hash,
                transaction_hash: row.transaction_hash,
                log_index: log_index(row.log_index)?,
                timestamp: row.block_timestamp,
            },
        })
    }
}

/// A row of the `trades` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TradeRow {
    /// Trade id.
    pub trade_id: BigDecimal,
    /// Bundled listing ids.
    pub listing_ids: Vec<BigDecimal>,
    /// Initiator address.
    pub from_address: String,
    /// Initiator token ids.
    pub from_token_ids: Vec<BigDecimal>,
    /// Initiator NFT contracts.
    pub from_nft_contracts: Vec<String>,
    /// Counterparty address.
    pub to_address: String,
    /// Counterparty token ids.
    pub to_token_ids: Vec<BigDecimal>,
    /// Counterparty NFT contracts.
    pub to_nft_contracts: Vec<String>,
    /// Status text.
    pub status: String,
    /// Creating log: block number.
    pub block_number: BigDecimal,
    /// Creating log: block hash.
    pub block_hash: String,
    /// Creating log: transaction hash.
    pub transaction_hash: String,
    /// Creating log: log index.
    pub log_index: i64,
    /// Creating log: block timestamp.
    pub block_timestamp: DateTime<Utc>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = IndexerError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            trade_id: to_u256(&row.trade_id)?,
            listing_ids: to_u256_list(&row.listing_ids)?,
            from: Peer {
                address: row.from_address,
                token_ids: to_u256_list(&row.from_token_ids)?,
                nft_contracts: row.from_nft_contracts,
            },
            to: Peer {
                address: row.to_address,
                token_ids: to_u256_list(&row.to_token_ids)?,
                nft_contracts: row.to_nft_contracts,
            },
            status: row.status.parse()?,
            created_from: EventProvenance {
                block_number: to_u64(&row.block_number)?,
                block_hash: row.block_hash,
                transaction_hash: row.transaction_hash,
                log_index: log_index(row.log_index)?,
                timestamp: row.block_timestamp,
            },
        })
    }
}

/// A row of the append-only `history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRow {
    /// Row id.
    pub id: Uuid,
    /// User.
    pub user_address: String,
    /// Listing id.
    pub listing_id: Option<BigDecimal>,
    /// Trade id.
    pub trade_id: Option<BigDecimal>,
    /// Status text.
    pub status: String,
    /// Block number.
    pub block_number: BigDecimal,
    /// Block hash.
    pub block_hash: String,
    /// Transaction hash.
    pub transaction_hash: String,
    /// Log index.
    pub log_index: i64,
    /// Block timestamp.
    pub block_timestamp: DateTime<Utc>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<HistoryRow> for HistoryEntry {
    type Error = IndexerError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_address: row.user_address,
            listing_id: row.listing_id.as_ref().map(to_u256).transpose()?,
            trade_id: row.trade_id.as_ref().map(to_u256).transpose()?,
            status: row.status.parse()?,
            provenance: EventProvenance {
                block_number: to_u64(&row.block_number)?,
                block_hash: row.block_hash,
                transaction_hash: row.transaction_hash,
                log_index: log_index(row.log_index)?,
                timestamp: row.block_timestamp,
            },
            created_at: row.created_at,
        })
    }
}

/// A row of the `notifications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    /// Row id.
    pub id: Uuid,
    /// Recipient.
    pub user_address: String,
    /// Status text.
    pub status: String,
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Read flag.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = IndexerError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_address: row.user_address,
            status: row.status.parse()?,
            title: row.title,
            body: row.body,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}
