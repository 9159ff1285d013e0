//! Projection of decoded contract events onto the store.
//!
//! [`Reconciler::apply`] handles one [`ParsedEvent`] at a time. Every arm of
//! the event `match` follows the same sequence: idempotency check, effect
//! (with its history rows, committed together), then notifications. A
//! duplicate-key failure from the store means a concurrent or earlier
//! attempt already applied the event and is reported as
//! [`Outcome::AlreadyApplied`].

use std::sync::Arc;

use alloy_primitives::{Address, U256};

use crate::chain::ChainState;
use crate::domain::listing::{format_ether, wei_to_ether};
use crate::domain::{
    ContractEvent, EventProvenance, HistoryEntry, HistoryStatus, Listing, ListingStatus,
    NftMetadata, ParsedEvent, Trade, TradeStatus, address_key,
};
use crate::enrichment::{MetadataSource, metadata_key};
use crate::error::IndexerError;
use crate::persistence::Store;
use crate::service::notifier::Notifier;

/// What applying an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed and history was appended.
    Applied,
    /// State already reflected the event; nothing was written.
    AlreadyApplied,
    /// The event cannot be applied (unknown entity, backward move, or an
    /// unsettled trade) and was dropped.
    Skipped,
}

/// One notification to send after a successful write.
struct Message {
    user: String,
    status: HistoryStatus,
    title: &'static str,
    body: String,
}

/// Applies contract events to the derived state.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainState>,
    metadata: Arc<dyn MetadataSource>,
    notifier: Arc<dyn Notifier>,
}

impl Reconciler {
    /// Creates a reconciler over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        chain: Arc<dyn ChainState>,
        metadata: Arc<dyn MetadataSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            chain,
            metadata,
            notifier,
        }
    }

    /// Applies one event.
    ///
    /// # Errors
    ///
    /// Storage failures and chain lookups that exhausted their retries.
    /// Duplicate-key failures are never returned.
    pub async fn apply(&self, parsed: &ParsedEvent) -> Result<Outcome, IndexerError> {
        let prov = &parsed.provenance;
        let outcome = match &parsed.event {
            ContractEvent::ListingCreated {
                listing_id,
                nft_contract,
                token_id,
                seller,
                price,
            } => {
                self.listing_created(*listing_id, nft_contract, *token_id, seller, *price, prov)
                    .await?
            }
            ContractEvent::ListingRemoved { listing_id, .. } => {
                self.listing_removed(*listing_id, prov).await?
            }
            ContractEvent::ListingSold { listing_id, buyer } => {
                self.listing_sold(*listing_id, buyer, prov).await?
            }
            ContractEvent::TradeCreated { trade_id, .. } => {
                self.trade_created(*trade_id, prov).await?
            }
            ContractEvent::TradeAccepted { trade_id } => {
                self.trade_transition(*trade_id, TradeStatus::Accepted, prov)
                    .await?
            }
            ContractEvent::TradeRejected { trade_id } => {
                self.trade_transition(*trade_id, TradeStatus::Rejected, prov)
                    .await?
            }
            ContractEvent::TradeCompleted { trade_id } => {
                self.trade_transition(*trade_id, TradeStatus::Completed, prov)
                    .await?
            }
        };

        tracing::debug!(
            event = parsed.event.name(),
            block = prov.block_number,
            tx_hash = %prov.transaction_hash,
            log_index = prov.log_index,
            initiator = parsed.initiator.as_deref().unwrap_or("unknown"),
            ?outcome,
            "event reconciled"
        );
        Ok(outcome)
    }

    async fn listing_created(
        &self,
        listing_id: U256,
        nft_contract: &Address,
        token_id: U256,
        seller: &Address,
        price_wei: U256,
        prov: &EventProvenance,
    ) -> Result<Outcome, IndexerError> {
        if self.store.listing(listing_id).await?.is_some() {
            return Ok(Outcome::AlreadyApplied);
        }

        let contract = address_key(nft_contract);
        let seller = address_key(seller);
        let listing = Listing {
            listing_id,
            metadata: self.fetch_metadata(&contract, token_id).await,
            contract_address: contract,
            token_id,
            seller_address: seller.clone(),
            buyer_address: None,
            price: wei_to_ether(price_wei),
            status: ListingStatus::Created,
            created_from: prov.clone(),
        };
        let history = [HistoryEntry::for_listing(
            &seller,
            listing_id,
            HistoryStatus::ListingCreated,
            prov,
        )];

        if let Err(err) = self.store.create_listing(&listing, &history).await {
            return absorb_duplicate(err);
        }
        tracing::info!(%listing_id, seller = %seller, price = %listing.price, "listing created");

        let price = format_ether(&listing.price);
        self.send(vec![Message {
            user: seller,
            status: HistoryStatus::ListingCreated,
            title: "Listing created",
            body: format!("You created listing #{listing_id}. Price: {price} ETH"),
        }])
        .await;
        Ok(Outcome::Applied)
    }

    async fn listing_removed(
        &self,
        listing_id: U256,
        prov: &EventProvenance,
    ) -> Result<Outcome, IndexerError> {
        let Some(listing) = self.store.listing(listing_id).await? else {
            tracing::warn!(%listing_id, "removal of unknown listing ignored");
            return Ok(Outcome::Skipped);
        };
        if listing.status == ListingStatus::Removed {
            return Ok(Outcome::AlreadyApplied);
        }
        if !listing.status.can_transition_to(ListingStatus::Removed) {
            tracing::warn!(%listing_id, status = %listing.status, "listing cannot be removed");
            return Ok(Outcome::Skipped);
        }

        let history = [HistoryEntry::for_listing(
            &listing.seller_address,
            listing_id,
            HistoryStatus::ListingRemoved,
            prov,
        )];
        let applied = match self
            .store
            .transition_listing(
                listing_id,
                listing.status,
                ListingStatus::Removed,
                None,
                &history,
            )
            .await
        {
            Ok(applied) => applied,
            Err(err) => return absorb_duplicate(err),
        };
        if !applied {
            return Ok(Outcome::AlreadyApplied);
        }
        tracing::info!(%listing_id, "listing removed");

        let price = format_ether(&listing.price);
        self.send(vec![Message {
            user: listing.seller_address,
            status: HistoryStatus::ListingRemoved,
            title: "Listing removed",
            body: format!("Your listing #{listing_id} has been removed. Price: {price} ETH"),
        }])
        .await;
        Ok(Outcome::Applied)
    }

    async fn listing_sold(
        &self,
        listing_id: U256,
        buyer: &Address,
        prov: &EventProvenance,
    ) -> Result<Outcome, IndexerError> {
        let Some(listing) = self.store.listing(listing_id).await? else {
            tracing::warn!(%listing_id, "sale of unknown listing ignored");
            return Ok(Outcome::Skipped);
        };
        if listing.status == ListingStatus::Sold {
            return Ok(Outcome::AlreadyApplied);
        }
        if !listing.status.can_transition_to(ListingStatus::Sold) {
            tracing::warn!(%listing_id, status = %listing.status, "listing cannot be sold");
            return Ok(Outcome::Skipped);
        }

        let buyer = address_key(buyer);
        let seller = listing.seller_address.clone();
        let history = [
            HistoryEntry::for_listing(&seller, listing_id, HistoryStatus::ListingSold, prov),
            HistoryEntry::for_listing(&buyer, listing_id, HistoryStatus::ListingBought, prov),
        ];
        let applied = match self
            .store
            .transition_listing(
                listing_id,
                listing.status,
                ListingStatus::Sold,
                Some(buyer.as_str()),
                &history,
            )
            .await
        {
            Ok(applied) => applied,
            Err(err) => return absorb_duplicate(err),
        };
        if !applied {
            return Ok(Outcome::AlreadyApplied);
        }
        tracing::info!(%listing_id, buyer = %buyer, "listing sold");

        let price = format_ether(&listing.price);
        self.send(vec![
            Message {
                user: seller,
                status: HistoryStatus::ListingSold,
                title: "Listing sold",
                body: format!("Your listing #{listing_id} was bought by {buyer} for {price} ETH"),
            },
            Message {
                user: buyer,
                status: HistoryStatus::ListingBought,
                title: "Listing bought",
                body: format!("You bought listing #{listing_id} for {price} ETH"),
            },
        ])
        .await;
        Ok(Outcome::Applied)
    }

    async fn trade_created(
        &self,
        trade_id: U256,
        prov: &EventProvenance,
    ) -> Result<Outcome, IndexerError> {
        if self.store.trade(trade_id).await?.is_some() {
            return Ok(Outcome::AlreadyApplied);
        }

        let data = self.chain.trade_data(trade_id).await?;
        if !data.is_settled() {
            tracing::warn!(
                %trade_id,
                from = %data.from.address,
                to = %data.to.address,
                "trade has a zero-address peer, not projected"
            );
            return Ok(Outcome::Skipped);
        }

        let trade = Trade {
            trade_id,
            listing_ids: Vec::new(),
            from: data.from,
            to: data.to,
            status: TradeStatus::Created,
            created_from: prov.clone(),
        };
        let from = trade.from.address.clone();
        let to = trade.to.address.clone();
        let history = [
            HistoryEntry::for_trade(&from, trade_id, HistoryStatus::TradeCreated, prov),
            HistoryEntry::for_trade(&to, trade_id, HistoryStatus::TradeReceived, prov),
        ];

        if let Err(err) = self.store.create_trade(&trade, &history).await {
            return absorb_duplicate(err);
        }
        tracing::info!(%trade_id, from = %from, to = %to, "trade created");

        self.send(vec![
            Message {
                user: from.clone(),
                status: HistoryStatus::TradeCreated,
                title: "Outgoing trade",
                body: format!("You sent trade #{trade_id} to {to}"),
            },
            Message {
                user: to,
                status: HistoryStatus::TradeReceived,
                title: "Incoming trade",
                body: format!("You received trade #{trade_id} from {from}"),
            },
        ])
        .await;
        Ok(Outcome::Applied)
    }

    async fn trade_transition(
        &self,
        trade_id: U256,
        target: TradeStatus,
        prov: &EventProvenance,
    ) -> Result<Outcome, IndexerError> {
        let Some(trade) = self.store.trade(trade_id).await? else {
            tracing::warn!(%trade_id, %target, "transition of unknown trade ignored");
            return Ok(Outcome::Skipped);
        };
        if trade.status == target {
            return Ok(Outcome::AlreadyApplied);
        }
        if !trade.status.can_transition_to(target) {
            tracing::warn!(%trade_id, from = %trade.status, to = %target, "backward trade transition ignored");
            return Ok(Outcome::Skipped);
        }

        let (status, title, verb) = match target {
            TradeStatus::Accepted => (HistoryStatus::TradeAccepted, "Trade accepted", "accepted"),
            TradeStatus::Rejected => (HistoryStatus::TradeRejected, "Trade rejected", "rejected"),
            TradeStatus::Completed => {
                (HistoryStatus::TradeCompleted, "Trade completed", "completed")
            }
            TradeStatus::Created | TradeStatus::Received => {
                return Err(IndexerError::Internal(format!(
                    "{target} is not a trade transition target"
                )));
            }
        };

        let mut users = vec![trade.from.address, trade.to.address];
        users.dedup();
        let history: Vec<HistoryEntry> = users
            .iter()
            .map(|user| HistoryEntry::for_trade(user, trade_id, status, prov))
            .collect();
        let applied = match self
            .store
            .transition_trade(trade_id, trade.status, target, &history)
            .await
        {
            Ok(applied) => applied,
            Err(err) => return absorb_duplicate(err),
        };
        if !applied {
            return Ok(Outcome::AlreadyApplied);
        }
        tracing::info!(%trade_id, status = %target, "trade updated");

        let body = format!("Trade #{trade_id} has been {verb}");
        self.send(
            users
                .into_iter()
                .map(|user| Message {
                    user,
                    status,
                    title,
                    body: body.clone(),
                })
                .collect(),
        )
        .await;
        Ok(Outcome::Applied)
    }

    async fn fetch_metadata(&self, contract: &str, token_id: U256) -> NftMetadata {
        let key = metadata_key(contract, token_id);
        let request = [(contract.to_string(), token_id)];
        match self.metadata.listing_metadata(&request).await {
            Ok(mut found) => match found.remove(&key) {
                Some(meta) => meta.into_nft(contract, token_id),
                None => {
                    tracing::warn!(key = %key, "no metadata for token");
                    NftMetadata::empty(contract, token_id)
                }
            },
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "metadata lookup failed");
                NftMetadata::empty(contract, token_id)
            }
        }
    }

    async fn send(&self, messages: Vec<Message>) {
        for message in messages {
            if let Err(err) = self
                .notifier
                .notify(&message.user, message.status, message.title, &message.body)
                .await
            {
                tracing::warn!(user = %message.user, status = %message.status, error = %err, "notification failed");
            }
        }
    }
}

fn absorb_duplicate(err: IndexerError) -> Result<Outcome, IndexerError> {
    if err.is_duplicate() {
        tracing::debug!(error = %err, "write raced an earlier attempt");
        Ok(Outcome::AlreadyApplied)
    } else {
        Err(err)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::domain::trade::{Peer, TradeData};
    use crate::enrichment::{NoMetadata, TokenMetadata};
    use crate::persistence::MemoryStore;

    #[derive(Debug)]
    struct FixedChain(TradeData);

    #[async_trait]
    impl ChainState for FixedChain {
        async fn trade_data(&self, _trade_id: U256) -> Result<TradeData, IndexerError> {
            Ok(self.0.clone())
        }

        async fn transaction_initiator(
            &self,
            _tx_hash: alloy_primitives::B256,
        ) -> Result<Address, IndexerError> {
            Ok(Address::repeat_byte(0x11))
        }
    }

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<(String, HistoryStatus, String)>>);

    impl Recorder {
        fn sent(&self) -> Vec<(String, HistoryStatus, String)> {
            self.0.lock().map(|v| v.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(
            &self,
            user_address: &str,
            status: HistoryStatus,
            _title: &str,
            body: &str,
        ) -> Result<(), IndexerError> {
            if let Ok(mut sent) = self.0.lock() {
                sent.push((user_address.to_string(), status, body.to_string()));
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(
            &self,
            _user_address: &str,
            _status: HistoryStatus,
            _title: &str,
            _body: &str,
        ) -> Result<(), IndexerError> {
            Err(IndexerError::Notification("hub down".into()))
        }
    }

    #[derive(Debug)]
    struct OneToken;

    #[async_trait]
    impl MetadataSource for OneToken {
        async fn listing_metadata(
            &self,
            _tokens: &[(String, U256)],
        ) -> Result<HashMap<String, TokenMetadata>, IndexerError> {
            Ok(HashMap::from([(
                metadata_key(&address_key(&Address::repeat_byte(0xAB)), U256::from(7)),
                TokenMetadata {
                    name: Some("Ape #7".into()),
                    ..TokenMetadata::default()
                },
            )]))
        }
    }

    fn peers(from: Address, to: Address) -> TradeData {
        TradeData {
            from: Peer::from_chain(&from, vec![U256::from(1)], &[Address::repeat_byte(0xAB)]),
            to: Peer::from_chain(&to, vec![U256::from(2)], &[Address::repeat_byte(0xAB)]),
            is_active: true,
        }
    }

    fn parsed(event: ContractEvent, tx: &str, log_index: u64) -> ParsedEvent {
        ParsedEvent {
            event,
            provenance: EventProvenance {
                block_number: 100,
                block_hash: "0xblock".into(),
                transaction_hash: tx.into(),
                log_index,
                timestamp: Utc::now(),
            },
            transaction_index: 0,
            initiator: None,
            topics: Vec::new(),
        }
    }

    fn created(id: u64) -> ParsedEvent {
        parsed(
            ContractEvent::ListingCreated {
                listing_id: U256::from(id),
                nft_contract: Address::repeat_byte(0xAB),
                token_id: U256::from(7),
                seller: Address::repeat_byte(0x5E),
                price: U256::from(1_500_000_000_000_000_000_u64),
            },
            "0xt1",
            0,
        )
    }

    fn setup(
        chain: TradeData,
        metadata: Arc<dyn MetadataSource>,
    ) -> (Arc<MemoryStore>, Arc<Recorder>, Reconciler) {
        let store = Arc::new(MemoryStore::new());
        let recorder = Arc::new(Recorder::default());
        let reconciler = Reconciler::new(
            Arc::clone(&store) as Arc<dyn Store>,
            Arc::new(FixedChain(chain)),
            metadata,
            Arc::clone(&recorder) as Arc<dyn Notifier>,
        );
        (store, recorder, reconciler)
    }

    fn default_setup() -> (Arc<MemoryStore>, Arc<Recorder>, Reconciler) {
        setup(
            peers(Address::repeat_byte(0x0F), Address::repeat_byte(0x70)),
            Arc::new(OneToken),
        )
    }

    #[tokio::test]
    async fn listing_created_enriches_and_notifies() {
        let (store, recorder, reconciler) = default_setup();

        let Ok(outcome) = reconciler.apply(&created(42)).await else {
            panic!("apply failed");
        };
        assert_eq!(outcome, Outcome::Applied);

        let Ok(Some(listing)) = store.listing(U256::from(42)).await else {
            panic!("listing missing");
        };
        assert_eq!(listing.metadata.name.as_deref(), Some("Ape #7"));
        assert_eq!(format_ether(&listing.price), "1.5");

        let sent = recorder.sent();
        assert_eq!(sent.len(), 1);
        let Some((user, status, body)) = sent.first() else {
            panic!("no notification");
        };
        assert_eq!(user, &address_key(&Address::repeat_byte(0x5E)));
        assert_eq!(*status, HistoryStatus::ListingCreated);
        assert_eq!(body, "You created listing #42. Price: 1.5 ETH");
    }

    #[tokio::test]
    async fn metadata_failure_does_not_block_creation() {
        let (store, _, reconciler) = setup(
            peers(Address::repeat_byte(1), Address::repeat_byte(2)),
            Arc::new(NoMetadata),
        );
        let Ok(Outcome::Applied) = reconciler.apply(&created(1)).await else {
            panic!("apply failed");
        };
        let Ok(Some(listing)) = store.listing(U256::from(1)).await else {
            panic!("listing missing");
        };
        assert_eq!(listing.metadata.name, None);
        assert_eq!(listing.metadata.token_id, U256::from(7));
    }

    #[tokio::test]
    async fn sold_writes_two_sided_history() {
        let (store, recorder, reconciler) = default_setup();
        let Ok(_) = reconciler.apply(&created(5)).await else {
            panic!("create failed");
        };
        let sold = parsed(
            ContractEvent::ListingSold {
                listing_id: U256::from(5),
                buyer: Address::repeat_byte(0xB0),
            },
            "0xt2",
            3,
        );
        let Ok(Outcome::Applied) = reconciler.apply(&sold).await else {
            panic!("sale failed");
        };

        let Ok(history) = store.listing_history(U256::from(5)).await else {
            panic!("history read failed");
        };
        let statuses: Vec<HistoryStatus> = history.iter().map(|h| h.status).collect();
        assert_eq!(statuses, vec![
            HistoryStatus::ListingCreated,
            HistoryStatus::ListingSold,
            HistoryStatus::ListingBought
        ]);
        assert_eq!(recorder.sent().len(), 3);

        let removed = parsed(
            ContractEvent::ListingRemoved {
                listing_id: U256::from(5),
                owner: Address::repeat_byte(0x5E),
            },
            "0xt3",
            0,
        );
        let Ok(outcome) = reconciler.apply(&removed).await else {
            panic!("apply failed");
        };
        assert_eq!(outcome, Outcome::Skipped);
        let Ok(Some(listing)) = store.listing(U256::from(5)).await else {
            panic!("listing missing");
        };
        assert_eq!(listing.status, ListingStatus::Sold);
    }

    #[tokio::test]
    async fn trade_lifecycle_moves_forward_only() {
        let (store, recorder, reconciler) = default_setup();
        let create = parsed(
            ContractEvent::TradeCreated {
                trade_id: U256::from(9),
                from: Address::repeat_byte(0x0F),
                to: Address::repeat_byte(0x70),
            },
            "0xt1",
            0,
        );
        let Ok(Outcome::Applied) = reconciler.apply(&create).await else {
            panic!("create failed");
        };
        let accept = parsed(ContractEvent::TradeAccepted { trade_id: U256::from(9) }, "0xt2", 0);
        let Ok(Outcome::Applied) = reconciler.apply(&accept).await else {
            panic!("accept failed");
        };
        let reject = parsed(ContractEvent::TradeRejected { trade_id: U256::from(9) }, "0xt3", 0);
        let Ok(Outcome::Skipped) = reconciler.apply(&reject).await else {
            panic!("reject after accept must be skipped");
        };
        let complete = parsed(ContractEvent::TradeCompleted { trade_id: U256::from(9) }, "0xt4", 0);
        let Ok(Outcome::Applied) = reconciler.apply(&complete).await else {
            panic!("complete failed");
        };

        let Ok(Some(trade)) = store.trade(U256::from(9)).await else {
            panic!("trade missing");
        };
        assert_eq!(trade.status, TradeStatus::Completed);
        assert!(trade.listing_ids.is_empty());

        let Ok(history) = store.trade_history(U256::from(9)).await else {
            panic!("history read failed");
        };
        assert_eq!(history.len(), 6);
        let bodies: Vec<String> = recorder.sent().into_iter().map(|(_, _, b)| b).collect();
        assert!(bodies.contains(&"Trade #9 has been completed".to_string()));
    }

    #[tokio::test]
    async fn self_trade_transitions_write_one_row_per_user() {
        let me = Address::repeat_byte(0x0F);
        let (store, recorder, reconciler) = setup(peers(me, me), Arc::new(NoMetadata));
        let create = parsed(
            ContractEvent::TradeCreated {
                trade_id: U256::from(11),
                from: me,
                to: me,
            },
            "0xt1",
            0,
        );
        let Ok(Outcome::Applied) = reconciler.apply(&create).await else {
            panic!("create failed");
        };
        let accept = parsed(ContractEvent::TradeAccepted { trade_id: U256::from(11) }, "0xt2", 1);
        let Ok(outcome) = reconciler.apply(&accept).await else {
            panic!("accept failed");
        };
        assert_eq!(outcome, Outcome::Applied);

        let Ok(Some(trade)) = store.trade(U256::from(11)).await else {
            panic!("trade missing");
        };
        assert_eq!(trade.status, TradeStatus::Accepted);
        let Ok(history) = store.trade_history(U256::from(11)).await else {
            panic!("history read failed");
        };
        let statuses: Vec<HistoryStatus> = history.iter().map(|h| h.status).collect();
        assert_eq!(statuses, vec![
            HistoryStatus::TradeCreated,
            HistoryStatus::TradeReceived,
            HistoryStatus::TradeAccepted
        ]);
        let accepted = recorder
            .sent()
            .into_iter()
            .filter(|(_, status, _)| *status == HistoryStatus::TradeAccepted)
            .count();
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn zero_address_trade_is_not_projected() {
        let (store, recorder, reconciler) = setup(
            peers(Address::ZERO, Address::repeat_byte(0x70)),
            Arc::new(NoMetadata),
        );
        let create = parsed(
            ContractEvent::TradeCreated {
                trade_id: U256::from(9),
                from: Address::ZERO,
                to: Address::repeat_byte(0x70),
            },
            "0xt1",
            0,
        );
        let Ok(outcome) = reconciler.apply(&create).await else {
            panic!("zero-address trade must not error");
        };
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(store.trade_count().await, 0);
        assert_eq!(store.history_count().await, 0);
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn notification_failures_are_swallowed() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(
            Arc::clone(&store),
            Arc::new(FixedChain(peers(Address::repeat_byte(1), Address::repeat_byte(2)))),
            Arc::new(NoMetadata),
            Arc::new(FailingNotifier),
        );
        let Ok(outcome) = reconciler.apply(&created(3)).await else {
            panic!("apply failed");
        };
        assert_eq!(outcome, Outcome::Applied);
    }
}
