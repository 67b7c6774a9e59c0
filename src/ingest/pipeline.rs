use std::sync::Arc;

use alloy::primitives::Address;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    checkpoint::Checkpoint,
    error::{FetchError, IngestError, MergeError, SubscriptionExhausted},
    historical::HistoricalFetcher,
    merge::{Sourced, StreamMerger},
    realtime::{RealtimeSubscriber, RetryPolicy},
    sink::{DedupSink, PersistOutcome},
};
use crate::{config::IngestSettings, contract::ChainClient, repo::EventStore};

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// First block to backfill when nothing is persisted yet.
    pub start_block: u64,
    pub chunk_size: u64,
    pub retry: RetryPolicy,
    pub merge_buffer: usize,
}

impl From<&IngestSettings> for IngestOptions {
    fn from(s: &IngestSettings) -> Self {
        Self {
            start_block: s.start_block,
            chunk_size: s.log_chunk_size,
            retry: RetryPolicy {
                max_attempts: s.sub_retry_max_attempts,
                base_delay: s.sub_retry_base_delay,
            },
            merge_buffer: s.merge_buffer,
        }
    }
}

/// What one run of the pipeline did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Inclusive backfill range, once the height snapshot was taken.
    pub backfill_range: Option<(u64, u64)>,
    pub persisted: u64,
    pub already_existed: u64,
    pub persist_failed: u64,
    pub backfill_error: Option<FetchError>,
    pub realtime_exhausted: Option<SubscriptionExhausted>,
    pub cancelled: bool,
}

impl IngestReport {
    /// Fail the run if the live side gave up.
    pub fn into_result(self) -> Result<Self, IngestError> {
        match self.realtime_exhausted {
            Some(e) => Err(IngestError::SubscriptionExhausted(e)),
            None => Ok(self),
        }
    }

    fn record(&mut self, sourced: &Sourced, outcome: PersistOutcome) {
        let ev = &sourced.event;
        match outcome {
            PersistOutcome::Persisted => {
                self.persisted += 1;
                info!(
                    source = ?sourced.source,
                    block = ev.block_number,
                    tx_hash = %ev.transaction_hash,
                    integrator = %ev.integrator,
                    "Persisted fee event"
                );
            }
            PersistOutcome::AlreadyExists => {
                self.already_existed += 1;
                debug!(
                    source = ?sourced.source,
                    block = ev.block_number,
                    tx_hash = %ev.transaction_hash,
                    "Duplicate fee event discarded"
                );
            }
        }
    }
}

/// Backfill from the checkpoint to the current head while following the
/// live feed, persisting every event once.
pub struct Ingestor {
    client: Arc<dyn ChainClient>,
    store: Arc<dyn EventStore>,
    contract: Address,
    options: IngestOptions,
}

impl Ingestor {
    pub fn new(
        client: Arc<dyn ChainClient>,
        store: Arc<dyn EventStore>,
        contract: Address,
        options: IngestOptions,
    ) -> Self {
        Self {
            client,
            store,
            contract,
            options,
        }
    }

    /// Run until both sources are done or `cancel` fires.
    ///
    /// The live subscription is attached before the head is sampled, so
    /// nothing mined between the snapshot and attachment is missed.
    pub async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let checkpoint = Checkpoint::new(self.store.clone());
        let sink = DedupSink::new(self.store.clone());
        let mut merger = StreamMerger::new(self.options.merge_buffer);

        // cancelled on every return path
        let live_scope = cancel.child_token();
        let _live_guard = live_scope.clone().drop_guard();
        let subscriber = RealtimeSubscriber::new(
            self.client.clone(),
            self.contract,
            self.options.retry.clone(),
            live_scope,
        );
        let attached = subscriber.attached();
        merger.spawn_realtime(subscriber.subscribe());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return Ok(report);
            }
            _ = attached.cancelled() => {}
        }

        let from = checkpoint
            .resume_from(self.options.start_block)
            .await
            .map_err(IngestError::Checkpoint)?;
        match self.client.current_height().await {
            Ok(to) => {
                if from > to {
                    info!(from, to, "Checkpoint at chain head, nothing to backfill");
                }
                report.backfill_range = Some((from, to));
                let fetcher = HistoricalFetcher::new(
                    self.client.clone(),
                    self.contract,
                    self.options.chunk_size,
                );
                merger.spawn_historical(fetcher.fetch_range(from, to));
            }
            Err(source) => {
                let e = FetchError::Height(source);
                error!(error = %e, "Backfill skipped, continuing live only");
                report.backfill_error = Some(e);
            }
        }

        let mut merged = merger.into_stream();
        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                item = merged.next() => item,
            };
            match item {
                None => break,
                Some(Ok(sourced)) => {
                    match sink.persist_if_new(&sourced.event).await {
                        Ok(outcome) => report.record(&sourced, outcome),
                        Err(e) => {
                            report.persist_failed += 1;
                            warn!(
                                block = sourced.event.block_number,
                                error = %e,
                                "Failed to persist fee event"
                            );
                        }
                    }
                }
                Some(Err(MergeError::Fetch(e))) => {
                    error!(error = %e, "Backfill failed, continuing live only");
                    report.backfill_error = Some(e);
                }
                Some(Err(MergeError::SubscriptionExhausted(e))) => {
                    error!(error = %e, "Live ingestion stopped");
                    report.realtime_exhausted = Some(e);
                }
            }
        }
        drop(merged);
        info!(
            persisted = report.persisted,
            already_existed = report.already_existed,
            persist_failed = report.persist_failed,
            cancelled = report.cancelled,
            "Ingestion stopped"
        );
        Ok(report)
    }
}
