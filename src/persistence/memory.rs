//! In-memory [`Store`] with the same semantics as the PostgreSQL store.

use std::collections::{BTreeMap, HashSet};

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::Store;
use crate::domain::{
    Cursor, HistoryEntry, HistoryStatus, Listing, ListingStatus, NftMetadata, Notification, Trade,
    TradeStatus, normalize_address,
};
use crate::error::IndexerError;

type HistoryKey = (String, u64, String, HistoryStatus);

#[derive(Debug, Default)]
struct Inner {
    cursor: Option<Cursor>,
    listings: BTreeMap<U256, Listing>,
    trades: BTreeMap<U256, Trade>,
    history: Vec<HistoryEntry>,
    history_keys: HashSet<HistoryKey>,
    notifications: Vec<Notification>,
}

impl Inner {
    /// Fails if any row would violate the history unique key.
    fn check_history(&self, entries: &[HistoryEntry]) -> Result<(), IndexerError> {
        let mut batch = HashSet::new();
        for entry in entries {
            let key = entry.dedup_key();
            if self.history_keys.contains(&key) || !batch.insert(key) {
                return Err(IndexerError::Duplicate(format!(
                    "history ({}, {}, {}, {})",
                    entry.provenance.transaction_hash,
                    entry.provenance.log_index,
                    entry.user_address,
                    entry.status
                )));
            }
        }
        Ok(())
    }

    fn append_history(&mut self, entries: &[HistoryEntry]) {
        for entry in entries {
            self.history_keys.insert(entry.dedup_key());
            self.history.push(entry.clone());
        }
    }

    fn history_matching<F>(&self, predicate: F) -> Vec<HistoryEntry>
    where
        F: Fn(&HistoryEntry) -> bool,
    {
        let mut rows: Vec<HistoryEntry> = self.history.iter().filter(|h| predicate(h)).cloned().collect();
        rows.sort_by_key(|h| (h.provenance.block_number, h.provenance.log_index, h.created_at));
        rows
    }
}

/// Volatile store backed by ordered maps behind a `tokio` lock.
///
/// Every call takes the lock once, so each unit of work is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored listings.
    pub async fn listing_count(&self) -> usize {
        self.inner.read().await.listings.len()
    }

    /// Number of stored trades.
    pub async fn trade_count(&self) -> usize {
        self.inner.read().await.trades.len()
    }

    /// Number of stored history rows.
    pub async fn history_count(&self) -> usize {
        self.inner.read().await.history.len()
    }

    /// Number of stored notifications.
    pub async fn notification_count(&self) -> usize {
        self.inner.read().await.notifications.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn cursor(&self) -> Result<Option<Cursor>, IndexerError> {
        Ok(self.inner.read().await.cursor)
    }

    async fn advance_cursor(&self, block: u64) -> Result<Cursor, IndexerError> {
        let mut inner = self.inner.write().await;
        let next = match inner.cursor {
            Some(current) if current.last_processed_block >= block => current,
            _ => Cursor::at(block),
        };
        inner.cursor = Some(next);
        Ok(next)
    }

    async fn listing(&self, listing_id: U256) -> Result<Option<Listing>, IndexerError> {
        Ok(self.inner.read().await.listings.get(&listing_id).cloned())
    }

    async fn trade(&self, trade_id: U256) -> Result<Option<Trade>, IndexerError> {
        Ok(self.inner.read().await.trades.get(&trade_id).cloned())
    }

    async fn create_listing(
        &self,
        listing: &Listing,
        history: &[HistoryEntry],
    ) -> Result<(), IndexerError> {
        let mut inner = self.inner.write().await;
        if inner.listings.contains_key(&listing.listing_id) {
            return Err(IndexerError::Duplicate(format!(
                "listing {}",
                listing.listing_id
            )));
        }
        inner.check_history(history)?;
        inner.listings.insert(listing.listing_id, listing.clone());
        inner.append_history(history);
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
        let mut inner = self.inner.write().await;
        let applies = inner
            .listings
            .get(&listing_id)
            .is_some_and(|l| l.status == from);
        if !applies {
            return Ok(false);
        }
        inner.check_history(history)?;
        if let Some(listing) = inner.listings.get_mut(&listing_id) {
            listing.status = to;
            if let Some(buyer) = buyer {
                listing.buyer_address = Some(normalize_address(buyer));
            }
        }
        inner.append_history(history);
        Ok(true)
    }

    async fn create_trade(&self, trade: &Trade, history: &[HistoryEntry]) -> Result<(), IndexerError> {
        let mut inner = self.inner.write().await;
        if inner.trades.contains_key(&trade.trade_id) {
            return Err(IndexerError::Duplicate(format!("trade {}", trade.trade_id)));
        }
        inner.check_history(history)?;
        inner.trades.insert(trade.trade_id, trade.clone());
        inner.append_history(history);
        Ok(())
    }

    async fn transition_trade(
        &self,
        trade_id: U256,
        from: TradeStatus,
        to: TradeStatus,
        history: &[HistoryEntry],
    ) -> Result<bool, IndexerError> {
        let mut inner = self.inner.write().await;
        let applies = inner
            .trades
            .get(&trade_id)
            .is_some_and(|t| t.status == from);
        if !applies {
            return Ok(false);
        }
        inner.check_history(history)?;
        if let Some(trade) = inner.trades.get_mut(&trade_id) {
            trade.status = to;
        }
        inner.append_history(history);
        Ok(true)
    }

    async fn listing_history(&self, listing_id: U256) -> Result<Vec<HistoryEntry>, IndexerError> {
        Ok(self
            .inner
            .read()
            .await
            .history_matching(|h| h.listing_id == Some(listing_id)))
    }

    async fn trade_history(&self, trade_id: U256) -> Result<Vec<HistoryEntry>, IndexerError> {
        Ok(self
            .inner
            .read()
            .await
            .history_matching(|h| h.trade_id == Some(trade_id)))
    }

    async fn user_history(&self, user_address: &str) -> Result<Vec<HistoryEntry>, IndexerError> {
        let user = normalize_address(user_address);
        Ok(self
            .inner
            .read()
            .await
            .history_matching(|h| h.user_address == user))
    }

    async fn save_notification(&self, notification: &Notification) -> Result<(), IndexerError> {
        let mut inner = self.inner.write().await;
        if inner.notifications.iter().any(|n| n.id == notification.id) {
            return Err(IndexerError::Duplicate(format!(
                "notification {}",
                notification.id
            )));
        }
        inner.notifications.push(notification.clone());
        Ok(())
    }

    async fn notifications(&self, user_address: &str) -> Result<Vec<Notification>, IndexerError> {
        let user = normalize_address(user_address);
        Ok(self
            .inner
            .read()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_address == user)
            .cloned()
            .collect())
    }

    async fn update_listing_metadata(
        &self,
        contract: &str,
        token_id: U256,
        metadata: &NftMetadata,
    ) -> Result<u64, IndexerError> {
        let contract = normalize_address(contract);
        let mut inner = self.inner.write().await;
        let mut updated = 0_u64;
        for listing in inner
            .listings
            .values_mut()
            .filter(|l| l.contract_address == contract && l.token_id == token_id)
        {
            listing.metadata = NftMetadata {
                token_id,
                contract_address: contract.clone(),
                last_updated: metadata.last_updated.or_else(|| Some(Utc::now())),
                ..metadata.clone()
            };
            updated += 1;
        }
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;
    use crate::domain::EventProvenance;

    fn provenance(tx: &str, log_index: u64) -> EventProvenance {
        EventProvenance {
            block_number: 10,
            block_hash: "0xblock".into(),
            transaction_hash: tx.into(),
            log_index,
            timestamp: Utc::now(),
        }
    }

    fn listing(id: u64) -> Listing {
        Listing {
            listing_id: U256::from(id),
            contract_address: "0xabc".into(),
            token_id: U256::from(7),
            seller_address: "0xseller".into(),
            buyer_address: None,
            price: BigDecimal::from(1),
            status: ListingStatus::Created,
            metadata: NftMetadata::empty("0xabc", U256::from(7)),
            created_from: provenance("0xt1", 0),
        }
    }

    fn created_row(id: u64) -> HistoryEntry {
        HistoryEntry::for_listing(
            "0xseller",
            U256::from(id),
            HistoryStatus::ListingCreated,
            &provenance("0xt1", 0),
        )
    }

    #[tokio::test]
    async fn cursor_never_moves_backwards() {
        let store = MemoryStore::new();
        assert!(matches!(store.cursor().await, Ok(None)));

        let Ok(c) = store.advance_cursor(100).await else {
            panic!("advance failed");
        };
        assert_eq!(c.last_processed_block, 100);

        let Ok(c) = store.advance_cursor(50).await else {
            panic!("advance failed");
        };
        assert_eq!(c.last_processed_block, 100);
    }

    #[tokio::test]
    async fn duplicate_listing_is_rejected_atomically() {
        let store = MemoryStore::new();
        let Ok(()) = store.create_listing(&listing(42), &[created_row(42)]).await else {
            panic!("first insert must succeed");
        };

        let again = store.create_listing(&listing(42), &[created_row(42)]).await;
        let Err(err) = again else {
            panic!("second insert must fail");
        };
        assert!(err.is_duplicate());
        assert_eq!(store.listing_count().await, 1);
        assert_eq!(store.history_count().await, 1);
    }

    #[tokio::test]
    async fn history_collision_rolls_back_entity_write() {
        let store = MemoryStore::new();
        let Ok(()) = store.create_listing(&listing(1), &[created_row(1)]).await else {
            panic!("insert failed");
        };

        // Same (tx, log, user, status) key as listing 1's row.
        let clash = HistoryEntry::for_listing(
            "0xseller",
            U256::from(2),
            HistoryStatus::ListingCreated,
            &provenance("0xt1", 0),
        );
        let result = store.create_listing(&listing(2), &[clash]).await;
        assert!(matches!(result, Err(IndexerError::Duplicate(_))));
        assert_eq!(store.listing_count().await, 1);
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let Ok(()) = store.create_listing(&listing(42), &[created_row(42)]).await else {
            panic!("insert failed");
        };
        let sold = HistoryEntry::for_listing(
            "0xseller",
            U256::from(42),
            HistoryStatus::ListingSold,
            &provenance("0xt2", 1),
        );

        let Ok(applied) = store
            .transition_listing(
                U256::from(42),
                ListingStatus::Created,
                ListingStatus::Sold,
                Some("0xBUYER"),
                std::slice::from_ref(&sold),
            )
            .await
        else {
            panic!("transition failed");
        };
        assert!(applied);

        let Ok(applied) = store
            .transition_listing(
                U256::from(42),
                ListingStatus::Created,
                ListingStatus::Removed,
                None,
                &[],
            )
            .await
        else {
            panic!("transition failed");
        };
        assert!(!applied);

        let Ok(Some(stored)) = store.listing(U256::from(42)).await else {
            panic!("listing missing");
        };
        assert_eq!(stored.status, ListingStatus::Sold);
        assert_eq!(stored.buyer_address.as_deref(), Some("0xbuyer"));
    }

    #[tokio::test]
    async fn metadata_update_counts_matching_listings() {
        let store = MemoryStore::new();
        let Ok(()) = store.create_listing(&listing(1), &[created_row(1)]).await else {
            panic!("insert failed");
        };
        let meta = NftMetadata {
            name: Some("Ape #7".into()),
            ..NftMetadata::default()
        };

        let Ok(n) = store.update_listing_metadata("0xABC", U256::from(7), &meta).await else {
            panic!("update failed");
        };
        assert_eq!(n, 1);
        let Ok(n) = store.update_listing_metadata("0xabc", U256::from(8), &meta).await else {
            panic!("update failed");
        };
        assert_eq!(n, 0);

        let Ok(Some(stored)) = store.listing(U256::from(1)).await else {
            panic!("listing missing");
        };
        assert_eq!(stored.metadata.name.as_deref(), Some("Ape #7"));
        assert_eq!(stored.metadata.token_id, U256::from(7));
    }
}
