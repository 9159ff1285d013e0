//! Out-of-band refresh of listing metadata.

use std::sync::Arc;

use alloy_primitives::U256;

use crate::domain::normalize_address;
use crate::enrichment::{MetadataSource, metadata_key};
use crate::error::IndexerError;
use crate::persistence::Store;

/// Re-queries the enrichment source and rewrites stored listing metadata.
///
/// Not driven by the ingestion loop; callers decide when to refresh.
#[derive(Debug, Clone)]
pub struct MetadataRefresher {
    store: Arc<dyn Store>,
    metadata: Arc<dyn MetadataSource>,
}

impl MetadataRefresher {
    /// Creates a refresher.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, metadata: Arc<dyn MetadataSource>) -> Self {
        Self { store, metadata }
    }

    /// Refreshes every `(contract, token_id)` in `items`.
    ///
    /// Tokens the source does not return are left untouched. Returns the
    /// number of listings updated.
    ///
    /// # Errors
    ///
    /// Enrichment or storage failures.
    pub async fn refresh(&self, items: &[(String, U256)]) -> Result<u64, IndexerError> {
        let tokens: Vec<(String, U256)> = items
            .iter()
            .map(|(contract, token_id)| (normalize_address(contract), *token_id))
            .collect();
        let mut found = self.metadata.listing_metadata(&tokens).await?;

        let mut updated = 0;
        for (contract, token_id) in tokens {
            let Some(meta) = found.remove(&metadata_key(&contract, token_id)) else {
                tracing::debug!(contract = %contract, %token_id, "no metadata returned");
                continue;
            };
            let nft = meta.into_nft(&contract, token_id);
            updated += self
                .store
                .update_listing_metadata(&contract, token_id, &nft)
                .await?;
        }
        tracing::info!(requested = items.len(), updated, "listing metadata refreshed");
        Ok(updated)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    use super::*;
    use crate::domain::{EventProvenance, HistoryEntry, HistoryStatus, Listing, ListingStatus, NftMetadata};
    use crate::enrichment::TokenMetadata;
    use crate::persistence::MemoryStore;

    #[derive(Debug)]
    struct Renamed;

    #[async_trait]
    impl MetadataSource for Renamed {
        async fn listing_metadata(
            &self,
            tokens: &[(String, U256)],
        ) -> Result<HashMap<String, TokenMetadata>, IndexerError> {
            Ok(tokens
                .iter()
                .filter(|(_, id)| *id == U256::from(7))
                .map(|(contract, id)| {
                    (
                        metadata_key(contract, *id),
                        TokenMetadata {
                            name: Some("Ape #7 (revealed)".into()),
                            ..TokenMetadata::default()
                        },
                    )
                })
                .collect())
        }
    }

    async fn seed(store: &MemoryStore, id: u64, token: u64) {
        let prov = EventProvenance {
            block_number: 1,
            block_hash: "0xb".into(),
            transaction_hash: format!("0xt{id}"),
            log_index: 0,
            timestamp: Utc::now(),
        };
        let listing = Listing {
            listing_id: U256::from(id),
            contract_address: "0xabc".into(),
            token_id: U256::from(token),
            seller_address: "0xseller".into(),
            buyer_address: None,
            price: BigDecimal::from(2),
            status: ListingStatus::Created,
            metadata: NftMetadata::empty("0xabc", U256::from(token)),
            created_from: prov.clone(),
        };
        let history = [HistoryEntry::for_listing(
            "0xseller",
            U256::from(id),
            HistoryStatus::ListingCreated,
            &prov,
        )];
        let Ok(()) = store.create_listing(&listing, &history).await else {
            panic!("seed failed");
        };
    }

    #[tokio::test]
    async fn refresh_updates_only_returned_tokens() {
        let store = Arc::new(MemoryStore::new());
        seed(&store, 1, 7).await;
        seed(&store, 2, 8).await;

        let refresher = MetadataRefresher::new(Arc::clone(&store) as Arc<dyn Store>, Arc::new(Renamed));
        let Ok(updated) = refresher
            .refresh(&[("0xABC".into(), U256::from(7)), ("0xabc".into(), U256::from(8))])
            .await
        else {
            panic!("refresh failed");
        };
        assert_eq!(updated, 1);

        let Ok(Some(first)) = store.listing(U256::from(1)).await else {
            panic!("listing missing");
        };
        assert_eq!(first.metadata.name.as_deref(), Some("Ape #7 (revealed)"));
        assert!(first.metadata.last_updated.is_some());

        let Ok(Some(second)) = store.listing(U256::from(2)).await else {
            panic!("listing missing");
        };
        assert_eq!(second.metadata.name, None);
    }
}
