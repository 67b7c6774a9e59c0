use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::{FetchError, MergeError, SubscriptionExhausted};
use crate::repo::FeeCollectedEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Historical,
    Realtime,
}

/// A candidate event tagged with the producer that saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced {
    pub source: Source,
    pub event: FeeCollectedEvent,
}

pub type MergedItem = Result<Sourced, MergeError>;

/// Fans the backfill and the live feed into one channel.
///
/// Each source runs as its own producer task; items are forwarded as soon as
/// they arrive. No ordering or uniqueness is enforced across sources. A
/// historical failure is forwarded and only ends the historical producer. A
/// real-time exhaustion is held back until the historical producer is done.
pub struct StreamMerger {
    tx: mpsc::Sender<MergedItem>,
    rx: mpsc::Receiver<MergedItem>,
    historical_done: CancellationToken,
    historical_spawned: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamMerger {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx,
            historical_done: CancellationToken::new(),
            historical_spawned: false,
            tasks: Vec::new(),
        }
    }

    pub fn spawn_historical<S>(&mut self, historical: S)
    where
        S: Stream<Item = Result<FeeCollectedEvent, FetchError>>
            + Send
            + 'static,
    {
        self.historical_spawned = true;
        let tx = self.tx.clone();
        let done = self.historical_done.clone();
        self.tasks.push(tokio::spawn(async move {
            let _done = done.drop_guard();
            let mut historical = std::pin::pin!(historical);
            while let Some(item) = historical.next().await {
                let (item, last) = match item {
                    Ok(event) => (
                        Ok(Sourced {
                            source: Source::Historical,
                            event,
                        }),
                        false,
                    ),
                    Err(e) => (Err(MergeError::from(e)), true),
                };
                if tx.send(item).await.is_err() || last {
                    break;
                }
            }
            debug!("Historical producer finished");
        }));
    }

    pub fn spawn_realtime<S>(&mut self, realtime: S)
    where
        S: Stream<Item = Result<FeeCollectedEvent, SubscriptionExhausted>>
            + Send
            + 'static,
    {
        let tx = self.tx.clone();
        let historical_done = self.historical_done.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut realtime = std::pin::pin!(realtime);
            loop {
                let next = tokio::select! {
                    _ = tx.closed() => break,
                    next = realtime.next() => next,
                };
                match next {
                    Some(Ok(event)) => {
                        let item = Sourced {
                            source: Source::Realtime,
                            event,
                        };
                        if tx.send(Ok(item)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(exhausted)) => {
                        tokio::select! {
                            _ = tx.closed() => break,
                            _ = historical_done.cancelled() => {}
                        }
                        let _ = tx.send(Err(exhausted.into())).await;
                        break;
                    }
                    None => break,
                }
            }
            debug!("Real-time producer finished");
        }));
    }

    /// Consume the merger; the stream ends once every producer has finished.
    pub fn into_stream(self) -> MergedStream {
        if !self.historical_spawned {
            self.historical_done.cancel();
        }
        drop(self.tx);
        MergedStream {
            inner: ReceiverStream::new(self.rx),
            tasks: self.tasks,
        }
    }
}

/// Merge a finite and an infinite source with interleaved delivery.
pub fn merge<H, R>(historical: H, realtime: R, capacity: usize) -> MergedStream
where
    H: Stream<Item = Result<FeeCollectedEvent, FetchError>> + Send + 'static,
    R: Stream<Item = Result<FeeCollectedEvent, SubscriptionExhausted>>
        + Send
        + 'static,
{
    let mut merger = StreamMerger::new(capacity);
    merger.spawn_realtime(realtime);
    merger.spawn_historical(historical);
    merger.into_stream()
}

/// Receiving side of a `StreamMerger`. Dropping it aborts both producers,
/// which releases the live subscription.
pub struct MergedStream {
    inner: ReceiverStream<MergedItem>,
    tasks: Vec<JoinHandle<()>>,
}

impl Stream for MergedStream {
    type Item = MergedItem;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for MergedStream {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
