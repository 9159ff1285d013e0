//! PostgreSQL implementation of [`Store`].

use alloy_primitives::U256;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use sqlx::{PgConnection, PgPool};

use super::Store;
use super::models::{CursorRow, HistoryRow, ListingRow, NotificationRow, TradeRow};
use super::numeric::{from_u64, from_u256, from_u256_list};
use crate::domain::{
    Cursor, HistoryEntry, Listing, ListingStatus, NftMetadata, Notification, Trade, TradeStatus,
    normalize_address,
};
use crate::error::IndexerError;

const LISTING_COLUMNS: &str = "listing_id, contract_address, token_id, seller_address, \
     buyer_address, price, status, metadata_kind, metadata_name, metadata_image_url, \
     metadata_description, metadata_last_price, metadata_last_updated, block_number, \
     block_hash, transaction_hash, log_index, block_timestamp";

const TRADE_COLUMNS: &str = "trade_id, listing_ids, from_address, from_token_ids, \
     from_nft_contracts, to_address, to_token_ids, to_nft_contracts, status, block_number, \
     block_hash, transaction_hash, log_index, block_timestamp";

const HISTORY_COLUMNS: &str = "id, user_address, listing_id, trade_id, status, block_number, \
     block_hash, transaction_hash, log_index, block_timestamp, created_at";

fn log_index(value: u64) -> Result<i64, IndexerError> {
    i64::try_from(value)
        .map_err(|_| IndexerError::Persistence(format!("log index {value} exceeds BIGINT")))
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// Each mutating call runs inside its own transaction.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), IndexerError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn insert_history(
        conn: &mut PgConnection,
        entries: &[HistoryEntry],
    ) -> Result<(), IndexerError> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO history (id, user_address, listing_id, trade_id, status, \
                 block_number, block_hash, transaction_hash, log_index, block_timestamp, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(entry.id)
            .bind(&entry.user_address)
            .bind(entry.listing_id.map(from_u256))
            .bind(entry.trade_id.map(from_u256))
            .bind(entry.status.as_str())
            .bind(from_u64(entry.provenance.block_number))
            .bind(&entry.provenance.block_hash)
            .bind(&entry.provenance.transaction_hash)
            .bind(log_index(entry.provenance.log_index)?)
            .bind(entry.provenance.timestamp)
            .bind(entry.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    async fn history_where(
        &self,
        clause: &str,
        value: BigDecimal,
    ) -> Result<Vec<HistoryEntry>, IndexerError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE {clause} = $1 \
             ORDER BY block_number, log_index, created_at"
        );
        let rows = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(HistoryEntry::try_from).collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn cursor(&self) -> Result<Option<Cursor>, IndexerError> {
        let row = sqlx::query_as::<_, CursorRow>(
            "SELECT last_processed_block, updated_at FROM indexer_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(Cursor::try_from).transpose()
    }

    async fn advance_cursor(&self, block: u64) -> Result<Cursor, IndexerError> {
        let row = sqlx::query_as::<_, CursorRow>(
            "INSERT INTO indexer_state (id, last_processed_block, updated_at) VALUES (1, $1, now()) \
             ON CONFLICT (id) DO UPDATE SET \
                 last_processed_block = GREATEST(indexer_state.last_processed_block, EXCLUDED.last_processed_block), \
                 updated_at = CASE \
                     WHEN EXCLUDED.last_processed_block > indexer_state.last_processed_block THEN now() \
                     ELSE indexer_state.updated_at END \
             RETURNING last_processed_block, updated_at",
        )
        .bind(from_u64(block))
        .fetch_one(&self.pool)
        .await?;
        Cursor::try_from(row)
    }

    async fn listing(&self, listing_id: U256) -> Result<Option<Listing>, IndexerError> {
        let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE listing_id = $1");
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(from_u256(listing_id))
            .fetch_optional(&self.pool)
            .await?;
        row.map(Listing::try_from).transpose()
    }

    async fn trade(&self, trade_id: U256) -> Result<Option<Trade>, IndexerError> {
        let sql = format!("SELECT {TRADE_COLUMNS} FROM trades WHERE trade_id = $1");
        let row = sqlx::query_as::<_, TradeRow>(&sql)
            .bind(from_u256(trade_id))
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trade::try_from).transpose()
    }

    async fn create_listing(
        &self,
        listing: &Listing,
        history: &[HistoryEntry],
    ) -> Result<(), IndexerError> {
        let mut tx = self.pool.begin().await?;
        let meta = &listing.metadata;
        let origin = &listing.created_from;
        sqlx::query(
            "INSERT INTO listings (listing_id, contract_address, token_id, seller_address, \
             buyer_address, price, status, metadata_kind, metadata_name, metadata_image_url, \
             metadata_description, metadata_last_price, metadata_last_updated, block_number, \
             block_hash, transaction_hash, log_index, block_timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(from_u256(listing.listing_id))
        .bind(&listing.contract_address)
        .bind(from_u256(listing.token_id))
        .bind(&listing.seller_address)
        .bind(listing.buyer_address.as_deref())
        .bind(&listing.price)
        .bind(listing.status.as_str())
        .bind(meta.kind.as_deref())
        .bind(meta.name.as_deref())
        .bind(meta.image_url.as_deref())
        .bind(meta.description.as_deref())
        .bind(meta.last_price.as_ref())
        .bind(meta.last_updated)
        .bind(from_u64(origin.block_number))
        .bind(&origin.block_hash)
        .bind(&origin.transaction_hash)
        .bind(log_index(origin.log_index)?)
        .bind(origin.timestamp)
        .execute(&mut *tx)
        .await?;

        Self::insert_history(&mut *tx, history).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn transition_listing(
        &self,
        listing_id: U256,
        from: ListingStatus,
        to: ListingStatus,
        buyer: Option<&str>,
        history: &[HistoryEntry],
    ) -> Result<bool, IndexerError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE listings SET status = $1, buyer_address = COALESCE($2, buyer_address), \
             updated_at = now() WHERE listing_id = $3 AND status = $4",
        )
        .bind(to.as_str())
        .bind(buyer.map(normalize_address))
        .bind(from_u256(listing_id))
        .bind(from.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        Self::insert_history(&mut *tx, history).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn create_trade(&self, trade: &Trade, history: &[HistoryEntry]) -> Result<(), IndexerError> {
        let mut tx = self.pool.begin().await?;
        let origin = &trade.created_from;
        sqlx::query(
            "INSERT INTO trades (trade_id, listing_ids, from_address, from_token_ids, \
             from_nft_contracts, to_address, to_token_ids, to_nft_contracts, status, block_number, \
             block_hash, transaction_hash, log_index, block_timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(from_u256(trade.trade_id))
        .bind(from_u256_list(&trade.listing_ids))
        .bind(&trade.from.address)
        .bind(from_u256_list(&trade.from.token_ids))
        .bind(&trade.from.nft_contracts)
        .bind(&trade.to.address)
        .bind(from_u256_list(&trade.to.token_ids))
        .bind(&trade.to.nft_contracts)
        .bind(trade.status.as_str())
        .bind(from_u64(origin.block_number))
        .bind(&origin.block_hash)
        .bind(&origin.transaction_hash)
        .bind(log_index(origin.log_index)?)
        .bind(origin.timestamp)
        .execute(&mut *tx)
        .await?;

        Self::insert_history(&mut *tx, history).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn transition_trade(
        &self,
        trade_id: U256,
        from: TradeStatus,
        to: TradeStatus,
        history: &[HistoryEntry],
    ) -> Result<bool, IndexerError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE trades SET status = $1, updated_at = now() WHERE trade_id = $2 AND status = $3",
        )
        .bind(to.as_str())
        .bind(from_u256(trade_id))
        .bind(from.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        Self::insert_history(&mut *tx, history).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn listing_history(&self, listing_id: U256) -> Result<Vec<HistoryEntry>, IndexerError> {
        self.history_where("listing_id", from_u256(listing_id)).await
    }

    async fn trade_history(&self, trade_id: U256) -> Result<Vec<HistoryEntry>, IndexerError> {
        self.history_where("trade_id", from_u256(trade_id)).await
    }

    async fn user_history(&self, user_address: &str) -> Result<Vec<HistoryEntry>, IndexerError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM history WHERE user_address = $1 \
             ORDER BY block_number, log_index, created_at"
        );
        let rows = sqlx::query_as::<_, HistoryRow>(&sql)
            .bind(normalize_address(user_address))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(HistoryEntry::try_from).collect()
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_address, status, title, body, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(notification.id)
        .bind(&notification.user_address)
        .bind(notification.status.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn notifications(&self, user_address: &str) -> Result<Vec<Notification>, IndexerError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            "SELECT id, user_address, status, title, body, is_read, created_at \
             FROM notifications WHERE user_address = $1 ORDER BY created_at",
        )
        .bind(normalize_address(user_address))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn update_listing_metadata(
        &self,
        contract: &str,
        token_id: U256,
        metadata: &NftMetadata,
    ) -> Result<u64, IndexerError> {
        let result = sqlx::query(
            "UPDATE listings SET metadata_kind = $1, metadata_name = $2, metadata_image_url = $3, \
             metadata_description = $4, metadata_last_price = $5, metadata_last_updated = $6, \
             updated_at = now() WHERE contract_address = $7 AND token_id = $8",
        )
        .bind(metadata.kind.as_deref())
        .bind(metadata.name.as_deref())
        .bind(metadata.image_url.as_deref())
        .bind(metadata.description.as_deref())
        .bind(metadata.last_price.as_ref())
        .bind(metadata.last_updated)
        .bind(normalize_address(contract))
        .bind(from_u256(token_id))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
