//! The ingestion loop.
//!
//! One [`Ingestor`] owns the cursor. Each cycle reads the cursor, fetches the
//! confirmed logs after it, reconciles them strictly in delivery order and
//! only then advances the cursor to the page's `next_block`. A crash or a
//! failed event therefore replays the range instead of skipping it; the
//! reconciler's idempotency checks absorb the replay.
//!
//! The first failed event ends the cycle. Later logs are left for the replay
//! so that events for the same listing or trade never commit out of order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use super::reconciler::{Outcome, Reconciler};
use crate::chain::ChainState;
use crate::config::PollConfig;
use crate::decoder::EventDecoder;
use crate::domain::{Cursor, EventProvenance, ParsedEvent, address_key};
use crate::error::IndexerError;
use crate::persistence::Store;
use crate::source::{LogBatch, LogSource, RawBlock, RawLog, RawTransaction};

/// Counters for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Block the cycle started from.
    pub from_block: u64,
    /// Logs received.
    pub logs: usize,
    /// Logs whose topic matched no known event.
    pub ignored: usize,
    /// Logs that matched an event but could not be decoded.
    pub undecodable: usize,
    /// Events that changed state.
    pub applied: usize,
    /// Events already reflected in state.
    pub already_applied: usize,
    /// Events dropped by the reconciler.
    pub skipped: usize,
    /// Events that failed and will be replayed.
    pub failed: usize,
    /// Logs left unreconciled because an earlier event failed.
    pub deferred: usize,
    /// New cursor value, when the cycle advanced it.
    pub advanced_to: Option<u64>,
}

impl CycleReport {
    /// `true` when the source had nothing new.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.logs == 0
    }
}

/// Drives the log source, decoder and reconciler.
#[derive(Debug)]
pub struct Ingestor {
    source: Arc<dyn LogSource>,
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainState>,
    reconciler: Reconciler,
    decoder: EventDecoder,
    start_block: u64,
    poll: PollConfig,
    cancel: CancellationToken,
}

impl Ingestor {
    /// Creates an ingestor.
    ///
    /// `start_block` is used while the store holds no cursor yet. `cancel`
    /// should be the token shared with the retry policy.
    #[must_use]
    pub fn new(
        source: Arc<dyn LogSource>,
        store: Arc<dyn Store>,
        chain: Arc<dyn ChainState>,
        reconciler: Reconciler,
        start_block: u64,
        poll: PollConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            store,
            chain,
            reconciler,
            decoder: EventDecoder::new(),
            start_block,
            poll,
            cancel,
        }
    }

    /// Runs a single poll cycle.
    ///
    /// # Errors
    ///
    /// Fails without advancing the cursor when the log source or the store
    /// fails, when a batch references a block or transaction it does not
    /// carry, or on cancellation. Individual event failures do not fail the
    /// cycle; they are counted in [`CycleReport::failed`], end the cycle and
    /// block the cursor advance.
    pub async fn poll_once(&self) -> Result<CycleReport, IndexerError> {
        let cursor = self
            .store
            .cursor()
            .await?
            .unwrap_or_else(|| Cursor::at(self.start_block));
        let from_block = cursor.last_processed_block;

        let page = self.source.get_logs(from_block).await?;
        let mut report = CycleReport {
            from_block,
            logs: page.log_count(),
            ..CycleReport::default()
        };

        for batch in &page.batches {
            if self.cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            self.process_batch(batch, &mut report).await?;
            if report.failed > 0 {
                break;
            }
        }

        if report.failed > 0 {
            report.deferred = report.logs.saturating_sub(
                report.ignored
                    + report.undecodable
                    + report.applied
                    + report.already_applied
                    + report.skipped
                    + report.failed,
            );
            tracing::warn!(
                from_block,
                failed = report.failed,
                deferred = report.deferred,
                "cycle stopped at a failed event, cursor not advanced"
            );
            return Ok(report);
        }

        if let Some(next) = cursor.advance_target(page.next_block) {
            let stored = self.store.advance_cursor(next).await?;
            report.advanced_to = Some(stored.last_processed_block);
        }
        Ok(report)
    }

    async fn process_batch(
        &self,
        batch: &LogBatch,
        report: &mut CycleReport,
    ) -> Result<(), IndexerError> {
        for log in &batch.logs {
            let event = match self.decoder.decode(&log.topics, &log.data) {
                Ok(Some(event)) => event,
                Ok(None) => {
                    report.ignored += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(
                        block = log.block_number,
                        log_index = log.log_index,
                        error = %err,
                        "undecodable log skipped"
                    );
                    report.undecodable += 1;
                    continue;
                }
            };

            let (block, tx) = locate(batch, log)?;
            let parsed = ParsedEvent {
                event,
                provenance: EventProvenance {
                    block_number: block.number,
                    block_hash: block.hash.to_string(),
                    transaction_hash: tx.hash.to_string(),
                    log_index: log.log_index,
                    timestamp: block.timestamp,
                },
                transaction_index: log.transaction_index,
                initiator: self.initiator(tx).await?,
                topics: log.topics.clone(),
            };
            match self.reconciler.apply(&parsed).await {
                Ok(Outcome::Applied) => report.applied += 1,
                Ok(Outcome::AlreadyApplied) => report.already_applied += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    tracing::error!(
                        block = log.block_number,
                        log_index = log.log_index,
                        tx_hash = %tx.hash,
                        error = %err,
                        "event failed, range will be replayed"
                    );
                    report.failed += 1;
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Sender of `tx`, resolved on-chain when the batch did not carry it.
    ///
    /// A failed lookup leaves the sender unknown; only cancellation is
    /// propagated.
    async fn initiator(&self, tx: &RawTransaction) -> Result<Option<String>, IndexerError> {
        if let Some(from) = tx.from {
            return Ok(Some(address_key(&from)));
        }
        match self.chain.transaction_initiator(tx.hash).await {
            Ok(sender) => Ok(Some(address_key(&sender))),
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                tracing::warn!(tx_hash = %tx.hash, error = %err, "transaction sender unresolved");
                Ok(None)
            }
        }
    }

    /// Delay after a cycle that reconciled logs without failures.
    fn delay_after(
        &self,
        report: &CycleReport,
        last_progress: &mut Option<DateTime<Utc>>,
    ) -> Duration {
        if report.advanced_to.is_some() {
            *last_progress = Some(Utc::now());
            Duration::ZERO
        } else {
            tracing::debug!(
                from_block = report.from_block,
                "cursor not advanced, backing off"
            );
            self.poll.idle_delay
        }
    }

    /// Polls until `cancel` fires.
    ///
    /// Failed cycles are logged and retried after the error delay. Cycles
    /// that did not move the cursor wait for the idle delay, so a source that
    /// keeps returning the same range is not polled in a tight loop. The
    /// in-flight event always finishes before the loop returns.
    pub async fn run(&self) {
        tracing::info!(start_block = self.start_block, "ingestion started");
        let mut last_progress: Option<DateTime<Utc>> = None;

        while !self.cancel.is_cancelled() {
            let delay = match self.poll_once().await {
                Ok(report) if report.failed > 0 => self.poll.error_delay,
                Ok(report) if report.is_idle() => self.poll.idle_delay,
                Ok(report) => {
                    tracing::info!(
                        from_block = report.from_block,
                        logs = report.logs,
                        applied = report.applied,
                        already_applied = report.already_applied,
                        skipped = report.skipped,
                        undecodable = report.undecodable,
                        advanced_to = ?report.advanced_to,
                        "cycle complete"
                    );
                    self.delay_after(&report, &mut last_progress)
                }
                Err(err) if err.is_cancelled() => break,
                Err(err) => {
                    tracing::error!(error = %err, ?last_progress, "ingestion cycle failed");
                    self.poll.error_delay
                }
            };

            if delay.is_zero() {
                continue;
            }
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!("shutdown requested, ingestion stopped");
    }
}

/// Finds the block and transaction records a log refers to.
fn locate<'a>(
    batch: &'a LogBatch,
    log: &RawLog,
) -> Result<(&'a RawBlock, &'a RawTransaction), IndexerError> {
    let block = batch.block(log.block_number).ok_or_else(|| {
        IndexerError::InvalidResponse(format!(
            "malformed batch: block {} missing",
            log.block_number
        ))
    })?;
    let tx = batch
        .transaction(log.block_number, log.transaction_index)
        .ok_or_else(|| {
            IndexerError::InvalidResponse(format!(
                "malformed batch: transaction {}/{} missing",
                log.block_number, log.transaction_index
            ))
        })?;
    Ok((block, tx))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use alloy_primitives::{Address, B256, Bytes};

    use super::*;

    #[test]
    fn locate_requires_block_and_transaction() {
        let log = RawLog {
            block_number: 7,
            transaction_index: 2,
            log_index: 0,
            address: Address::ZERO,
            topics: Vec::new(),
            data: Bytes::new(),
        };
        let mut batch = LogBatch {
            logs: vec![log.clone()],
            ..LogBatch::default()
        };
        assert!(matches!(
            locate(&batch, &log),
            Err(IndexerError::InvalidResponse(_))
        ));

        batch.blocks.push(RawBlock {
            number: 7,
            hash: B256::repeat_byte(1),
            timestamp: Utc::now(),
        });
        assert!(locate(&batch, &log).is_err());

        batch.transactions.push(RawTransaction {
            block_number: 7,
            transaction_index: 2,
            hash: B256::repeat_byte(2),
            from: None,
        });
        let Ok((block, tx)) = locate(&batch, &log) else {
            panic!("records present");
        };
        assert_eq!(block.number, 7);
        assert_eq!(tx.hash, B256::repeat_byte(2));
    }

    #[test]
    fn idle_report() {
        let report = CycleReport::default();
        assert!(report.is_idle());
        let busy = CycleReport {
            logs: 3,
            ..CycleReport::default()
        };
        assert!(!busy.is_idle());
    }
}
