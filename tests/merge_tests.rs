mod common;

use std::{sync::Arc, time::Duration};

use common::{CONTRACT, retry, stored_event};
use fee_indexer::{
    contract::{ChainError, scripted::ScriptedChainClient},
    ingest::{
        FetchError, MergeError, RealtimeSubscriber, Source,
        SubscriptionExhausted, merge,
    },
    repo::FeeCollectedEvent,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

type HistTx = mpsc::Sender<Result<FeeCollectedEvent, FetchError>>;
type LiveTx = mpsc::Sender<Result<FeeCollectedEvent, SubscriptionExhausted>>;

fn channels() -> (
    HistTx,
    LiveTx,
    fee_indexer::ingest::MergedStream,
) {
    let (hist_tx, hist_rx) = mpsc::channel(8);
    let (live_tx, live_rx) = mpsc::channel(8);
    let merged = merge(
        ReceiverStream::new(hist_rx),
        ReceiverStream::new(live_rx),
        16,
    );
    (hist_tx, live_tx, merged)
}

fn exhausted() -> SubscriptionExhausted {
    SubscriptionExhausted {
        attempts: 3,
        last_error: "gone".into(),
    }
}

#[tokio::test]
async fn live_items_interleave_with_an_open_backfill() {
    let (hist_tx, live_tx, mut merged) = channels();

    live_tx.send(Ok(stored_event(500, 1))).await.unwrap();
    let first = merged.next().await.unwrap().unwrap();
    assert_eq!(first.source, Source::Realtime);
    assert_eq!(first.event.block_number, 500);

    hist_tx.send(Ok(stored_event(101, 2))).await.unwrap();
    let second = merged.next().await.unwrap().unwrap();
    assert_eq!(second.source, Source::Historical);
    assert_eq!(second.event.block_number, 101);

    live_tx.send(Ok(stored_event(501, 3))).await.unwrap();
    assert_eq!(
        merged.next().await.unwrap().unwrap().source,
        Source::Realtime
    );

    drop(hist_tx);
    drop(live_tx);
    assert!(merged.next().await.is_none());
}

#[tokio::test]
async fn same_event_from_both_sources_is_delivered_twice() {
    let (hist_tx, live_tx, mut merged) = channels();
    hist_tx.send(Ok(stored_event(104, 9))).await.unwrap();
    live_tx.send(Ok(stored_event(104, 9))).await.unwrap();
    drop(hist_tx);
    drop(live_tx);

    let mut sources = Vec::new();
    while let Some(item) = merged.next().await {
        let item = item.unwrap();
        assert_eq!(item.event.transaction_hash, common::tx_hex(9));
        sources.push(item.source);
    }
    sources.sort_by_key(|s| *s == Source::Realtime);
    assert_eq!(sources, vec![Source::Historical, Source::Realtime]);
}

#[tokio::test]
async fn backfill_failure_leaves_the_live_side_running() {
    let (hist_tx, live_tx, mut merged) = channels();
    let failure = FetchError::Range {
        from: 6,
        to: 10,
        source: ChainError::Transport("timeout".into()),
    };
    hist_tx.send(Err(failure.clone())).await.unwrap();
    assert_eq!(
        merged.next().await.unwrap().unwrap_err(),
        MergeError::Fetch(failure)
    );

    live_tx.send(Ok(stored_event(700, 1))).await.unwrap();
    let item = merged.next().await.unwrap().unwrap();
    assert_eq!(item.source, Source::Realtime);
    assert_eq!(item.event.block_number, 700);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_waits_for_the_backfill_to_finish() {
    let (hist_tx, live_tx, mut merged) = channels();
    live_tx.send(Err(exhausted())).await.unwrap();
    drop(live_tx);

    let pending =
        tokio::time::timeout(Duration::from_secs(1), merged.next()).await;
    assert!(pending.is_err(), "exhaustion delivered before backfill ended");

    hist_tx.send(Ok(stored_event(102, 1))).await.unwrap();
    let item = merged.next().await.unwrap().unwrap();
    assert_eq!(item.source, Source::Historical);

    drop(hist_tx);
    assert_eq!(
        merged.next().await.unwrap().unwrap_err(),
        MergeError::SubscriptionExhausted(exhausted())
    );
    assert!(merged.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_merged_stream_releases_the_subscription() {
    let chain = ScriptedChainClient::new(0);
    let realtime = RealtimeSubscriber::new(
        Arc::new(chain.clone()),
        CONTRACT,
        retry(100),
        CancellationToken::new(),
    )
    .subscribe();
    let (_hist_tx, hist_rx) = mpsc::channel(1);
    let merged = merge(ReceiverStream::new(hist_rx), realtime, 4);

    chain.wait_for_active(1).await;
    drop(merged);
    tokio::time::timeout(Duration::from_secs(5), chain.wait_for_idle())
        .await
        .expect("subscription still registered");
}
