mod common;

use std::{sync::Arc, time::Duration};

use common::{
    CONTRACT, eventually, fee_log, fee_log_missing_integrator_fee, options,
    stored_event, tx_hex,
};
use fee_indexer::{
    contract::scripted::{ScriptedChainClient, SubscribeOutcome},
    ingest::{Checkpoint, FetchError, IngestError, IngestReport, Ingestor},
    repo::MemoryEventStore,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn ingestor(
    chain: &ScriptedChainClient,
    store: &Arc<MemoryEventStore>,
    start_block: u64,
    chunk_size: u64,
) -> Ingestor {
    Ingestor::new(
        Arc::new(chain.clone()),
        store.clone(),
        CONTRACT,
        options(start_block, chunk_size),
    )
}

fn spawn_run(
    ingestor: Ingestor,
    cancel: &CancellationToken,
) -> JoinHandle<Result<IngestReport, IngestError>> {
    let cancel = cancel.clone();
    tokio::spawn(async move { ingestor.run(cancel).await })
}

async fn released(chain: &ScriptedChainClient) {
    tokio::time::timeout(Duration::from_secs(5), chain.wait_for_idle())
        .await
        .expect("live subscription still registered");
}

/// Live side fails every attempt so the run ends once the backfill drains.
fn live_unavailable(chain: &ScriptedChainClient) {
    chain.script_subscribe([
        SubscribeOutcome::Fail("down".into()),
        SubscribeOutcome::Fail("down".into()),
        SubscribeOutcome::Fail("down".into()),
    ]);
}

#[tokio::test]
async fn backfill_and_live_replay_store_each_event_once() {
    let chain = ScriptedChainClient::new(105);
    chain.push_history(fee_log(99, 99));
    chain.push_history(fee_log(101, 1));
    chain.push_history(fee_log(104, 4));
    let store = Arc::new(MemoryEventStore::with_events([stored_event(100, 100)]));
    let cancel = CancellationToken::new();
    let run = spawn_run(ingestor(&chain, &store, 0, 1000), &cancel);

    chain.wait_for_active(1).await;
    chain.emit(fee_log(104, 4));
    eventually("three persist checks", || store.lookup_count() == 3).await;
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.backfill_range, Some((101, 105)));
    assert_eq!(report.persisted, 2);
    assert_eq!(report.already_existed, 1);
    assert_eq!(report.persist_failed, 0);

    let blocks: Vec<_> =
        store.snapshot().iter().map(|e| e.block_number).collect();
    assert_eq!(blocks, vec![100, 101, 104]);
    assert_eq!(
        store
            .snapshot()
            .iter()
            .filter(|e| e.transaction_hash == tx_hex(4))
            .count(),
        1
    );
    assert_eq!(chain.requested_ranges(), vec![(101, 105)]);
    released(&chain).await;
}

#[tokio::test]
async fn backfill_resumes_after_the_checkpoint() {
    let chain = ScriptedChainClient::new(2600);
    chain.push_history(fee_log(1500, 1));
    live_unavailable(&chain);
    let store = Arc::new(MemoryEventStore::with_events([stored_event(100, 100)]));

    let report = ingestor(&chain, &store, 0, 1000)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        chain.requested_ranges(),
        vec![(101, 1100), (1101, 2100), (2101, 2600)]
    );
    assert_eq!(report.backfill_range, Some((101, 2600)));
    assert_eq!(report.persisted, 1);
    assert!(report.realtime_exhausted.is_some());
    assert!(matches!(
        report.into_result(),
        Err(IngestError::SubscriptionExhausted(e)) if e.attempts == 3
    ));
}

#[tokio::test]
async fn empty_store_starts_at_the_configured_block() {
    let chain = ScriptedChainClient::new(60);
    chain.push_history(fee_log(40, 1));
    chain.push_history(fee_log(55, 2));
    live_unavailable(&chain);
    let store = Arc::new(MemoryEventStore::new());

    let report = ingestor(&chain, &store, 50, 1000)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(chain.requested_ranges(), vec![(50, 60)]);
    assert_eq!(report.persisted, 1);
    let checkpoint = Checkpoint::new(store.clone());
    assert_eq!(checkpoint.latest_persisted_block().await.unwrap(), Some(55));
    assert_eq!(checkpoint.resume_from(50).await.unwrap(), 56);
}

#[tokio::test]
async fn checkpoint_matches_highest_backfilled_block() {
    let chain = ScriptedChainClient::new(300);
    for (block, n) in [(210, 1), (250, 2), (299, 3)] {
        chain.push_history(fee_log(block, n));
    }
    live_unavailable(&chain);
    let store = Arc::new(MemoryEventStore::with_events([stored_event(200, 200)]));

    let report = ingestor(&chain, &store, 0, 40)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.persisted, 3);
    assert_eq!(
        Checkpoint::new(store.clone())
            .latest_persisted_block()
            .await
            .unwrap(),
        Some(299)
    );
}

#[tokio::test]
async fn malformed_log_never_reaches_the_store() {
    let chain = ScriptedChainClient::new(110);
    chain.push_history(fee_log_missing_integrator_fee(105, 1));
    live_unavailable(&chain);
    let store = Arc::new(MemoryEventStore::with_events([stored_event(100, 100)]));

    let report = ingestor(&chain, &store, 0, 1000)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.persisted, 0);
    assert_eq!(store.lookup_count(), 0);
    assert_eq!(store.insert_count(), 0);
    assert_eq!(
        Checkpoint::new(store.clone())
            .latest_persisted_block()
            .await
            .unwrap(),
        Some(100)
    );
}

#[tokio::test]
async fn checkpoint_at_head_skips_the_backfill() {
    let chain = ScriptedChainClient::new(100);
    live_unavailable(&chain);
    let store = Arc::new(MemoryEventStore::with_events([stored_event(100, 100)]));

    let report = ingestor(&chain, &store, 0, 1000)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.backfill_range, Some((101, 100)));
    assert!(chain.requested_ranges().is_empty());
    assert_eq!(report.persisted, 0);
}

#[tokio::test]
async fn backfill_failure_keeps_live_ingestion() {
    let chain = ScriptedChainClient::new(300);
    chain.push_history(fee_log(120, 1));
    chain.fail_queries_from(200);
    let store = Arc::new(MemoryEventStore::new());
    let cancel = CancellationToken::new();
    let run = spawn_run(ingestor(&chain, &store, 100, 100), &cancel);

    chain.wait_for_active(1).await;
    eventually("backfill failure", || chain.requested_ranges().len() == 2)
        .await;
    chain.emit(fee_log(301, 7));
    eventually("live event stored", || store.len() == 2).await;
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert!(matches!(
        report.backfill_error,
        Some(FetchError::Range { from: 200, to: 299, .. })
    ));
    assert_eq!(report.persisted, 2);
    assert_eq!(chain.requested_ranges(), vec![(100, 199), (200, 299)]);
}

#[tokio::test]
async fn unavailable_height_runs_live_only() {
    let chain = ScriptedChainClient::new(0);
    chain.fail_height(true);
    let store = Arc::new(MemoryEventStore::new());
    let cancel = CancellationToken::new();
    let run = spawn_run(ingestor(&chain, &store, 1, 1000), &cancel);

    chain.wait_for_active(1).await;
    chain.emit(fee_log(900, 1));
    eventually("live event stored", || store.len() == 1).await;
    cancel.cancel();

    let report = run.await.unwrap().unwrap();
    assert!(matches!(report.backfill_error, Some(FetchError::Height(_))));
    assert_eq!(report.backfill_range, None);
    assert!(chain.requested_ranges().is_empty());
}

#[tokio::test]
async fn persist_failures_do_not_stop_the_run() {
    let chain = ScriptedChainClient::new(20);
    chain.push_history(fee_log(11, 1));
    chain.push_history(fee_log(12, 2));
    live_unavailable(&chain);
    let store = Arc::new(MemoryEventStore::new());
    store.fail_writes(true);

    let report = ingestor(&chain, &store, 10, 1000)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.persist_failed, 2);
    assert_eq!(report.persisted, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn unreadable_checkpoint_fails_the_run() {
    let chain = ScriptedChainClient::new(20);
    let store = Arc::new(MemoryEventStore::new());
    store.fail_reads(true);
    let cancel = CancellationToken::new();

    let err = ingestor(&chain, &store, 10, 1000)
        .run(cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Checkpoint(_)));
    released(&chain).await;
}

#[tokio::test]
async fn cancellation_releases_the_live_subscription() {
    let chain = ScriptedChainClient::new(10);
    let store = Arc::new(MemoryEventStore::new());
    let cancel = CancellationToken::new();
    let run = spawn_run(ingestor(&chain, &store, 1, 1000), &cancel);

    chain.wait_for_active(1).await;
    cancel.cancel();
    let report = run.await.unwrap().unwrap();
    assert!(report.cancelled);
    released(&chain).await;
}
