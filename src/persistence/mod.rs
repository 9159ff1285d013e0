//! Persistence layer: cursor, projected entities, history and notifications.
//!
//! [`Store`] is the single persistence seam. Every method that mutates a
//! listing or trade takes the history rows describing the mutation and
//! commits both in one unit of work, so an entity never changes without its
//! audit trail. Unique-key collisions surface as
//! [`IndexerError::Duplicate`](crate::error::IndexerError::Duplicate).
//!
//! Two implementations are provided: [`PostgresStore`] backed by
//! `sqlx::PgPool`, and [`MemoryStore`] for tests and ephemeral runs.

pub mod memory;
pub mod models;
pub mod numeric;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use alloy_primitives::U256;
use async_trait::async_trait;

use crate::domain::{
    Cursor, HistoryEntry, Listing, ListingStatus, NftMetadata, Notification, Trade, TradeStatus,
};
use crate::error::IndexerError;

/// Durable storage for the indexer.
#[async_trait]
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Reads the ingestion cursor; `None` before the first advance.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn cursor(&self) -> Result<Option<Cursor>, IndexerError>;

    /// Moves the cursor to `block` unless it already stands at or beyond it.
    ///
    /// Returns the cursor as stored after the call.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn advance_cursor(&self, block: u64) -> Result<Cursor, IndexerError>;

    /// Looks up a listing.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn listing(&self, listing_id: U256) -> Result<Option<Listing>, IndexerError>;

    /// Looks up a trade.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn trade(&self, trade_id: U256) -> Result<Option<Trade>, IndexerError>;

    /// Inserts a new listing together with its history rows.
    ///
    /// # Errors
    ///
    /// [`IndexerError::Duplicate`] if the listing or a history row exists.
    async fn create_listing(
        &self,
        listing: &Listing,
        history: &[HistoryEntry],
    ) -> Result<(), IndexerError>;

    /// Compare-and-set status change.
    ///
    /// Applies only when the stored status equals `from`; returns whether
    /// the transition (and its history rows) was committed.
    ///
    /// # Errors
    ///
    /// [`IndexerError::Duplicate`] if a history row exists; storage failures.
    async fn transition_listing(
        &self,
        listing_id: U256,
        from: ListingStatus,
        to: ListingStatus,
        buyer: Option<&str>,
        history: &[HistoryEntry],
    ) -> Result<bool, IndexerError>;

    /// Inserts a new trade together with its history rows.
    ///
    /// # Errors
    ///
    /// [`IndexerError::Duplicate`] if the trade or a history row exists.
    async fn create_trade(&self, trade: &Trade, history: &[HistoryEntry]) -> Result<(), IndexerError>;

    /// Compare-and-set status change, as for listings.
    ///
    /// # Errors
    ///
    /// [`IndexerError::Duplicate`] if a history row exists; storage failures.
    async fn transition_trade(
        &self,
        trade_id: U256,
        from: TradeStatus,
        to: TradeStatus,
        history: &[HistoryEntry],
    ) -> Result<bool, IndexerError>;

    /// History of a listing, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn listing_history(&self, listing_id: U256) -> Result<Vec<HistoryEntry>, IndexerError>;

    /// History of a trade, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn trade_history(&self, trade_id: U256) -> Result<Vec<HistoryEntry>, IndexerError>;

    /// History of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn user_history(&self, user_address: &str) -> Result<Vec<HistoryEntry>, IndexerError>;

    /// Stores a notification.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn save_notification(&self, notification: &Notification) -> Result<(), IndexerError>;

    /// Notifications of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn notifications(&self, user_address: &str) -> Result<Vec<Notification>, IndexerError>;

    /// Overwrites the embedded metadata of every listing of
    /// (`contract`, `token_id`); returns the number of listings updated.
    ///
    /// # Errors
    ///
    /// Storage failures.
    async fn update_listing_metadata(
        &self,
        contract: &str,
        token_id: U256,
        metadata: &NftMetadata,
    ) -> Result<u64, IndexerError>;
}
