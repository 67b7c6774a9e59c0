//! In-memory `ChainClient` with a scriptable subscription lifecycle.
//!
//! Backs the pipeline tests: a fixed log history for range queries, a height
//! that can move, and a queue of subscribe outcomes so reconnect behaviour can
//! be driven attempt by attempt.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use alloy::{
    primitives::{Address, B256, Log as PrimitiveLog, U256},
    rpc::types::{Filter, Log},
    sol_types::SolEvent,
};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::{
    sync::{Notify, mpsc},
    time::Instant,
};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{
    FeesCollected,
    client::{ChainClient, ChainError, LogSubscription},
};

/// Build a `FeesCollected` log as the node would return it.
pub fn fees_collected_log(
    contract: Address,
    block_number: u64,
    tx_hash: B256,
    token: Address,
    integrator: Address,
    integrator_fee: U256,
    protocol_fee: U256,
) -> Log {
    let data = FeesCollected {
        _token: token,
        _integrator: integrator,
        _integratorFee: integrator_fee,
        _lifiFee: protocol_fee,
    }
    .encode_log_data();
    Log {
        inner: PrimitiveLog {
            address: contract,
            data,
        },
        block_hash: None,
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(tx_hash),
        transaction_index: Some(0),
        log_index: Some(0),
        removed: false,
    }
}

/// What the next `subscribe_logs` call does.
#[derive(Debug, Clone)]
pub enum SubscribeOutcome {
    Open,
    Fail(String),
}

#[derive(Default)]
struct Shared {
    history: Mutex<Vec<Log>>,
    height: AtomicU64,
    fail_height: AtomicBool,
    fail_queries_from: Mutex<Option<u64>>,
    requested_ranges: Mutex<Vec<(u64, u64)>>,
    script: Mutex<VecDeque<SubscribeOutcome>>,
    attempts: Mutex<Vec<Instant>>,
    live: Mutex<Vec<mpsc::UnboundedSender<Result<Log, ChainError>>>>,
    active: AtomicUsize,
    changed: Notify,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct ScriptedChainClient {
    shared: Arc<Shared>,
}

impl ScriptedChainClient {
    pub fn new(height: u64) -> Self {
        let client = Self::default();
        client.set_height(height);
        client
    }

    pub fn set_height(&self, height: u64) {
        self.shared.height.store(height, Ordering::SeqCst);
    }

    pub fn fail_height(&self, fail: bool) {
        self.shared.fail_height.store(fail, Ordering::SeqCst);
    }

    /// Add a mined log to the history served by range queries.
    pub fn push_history(&self, log: Log) {
        lock(&self.shared.history).push(log);
    }

    /// Range queries whose start is at or past `block` fail.
    pub fn fail_queries_from(&self, block: u64) {
        *lock(&self.shared.fail_queries_from) = Some(block);
    }

    /// Every `(from, to)` range requested so far, in order.
    pub fn requested_ranges(&self) -> Vec<(u64, u64)> {
        lock(&self.shared.requested_ranges).clone()
    }

    /// Queue outcomes for upcoming subscribe calls; once drained every
    /// call opens.
    pub fn script_subscribe(
        &self,
        outcomes: impl IntoIterator<Item = SubscribeOutcome>,
    ) {
        lock(&self.shared.script).extend(outcomes);
    }

    /// Instants of every subscribe call, successful or not.
    pub fn subscribe_attempts(&self) -> Vec<Instant> {
        lock(&self.shared.attempts).clone()
    }

    /// Subscriptions currently registered and not yet dropped.
    pub fn active_subscriptions(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Push a log to every live subscriber.
    pub fn emit(&self, log: Log) {
        lock(&self.shared.live).retain(|tx| tx.send(Ok(log.clone())).is_ok());
    }

    /// Push a transport error to every live subscriber.
    pub fn emit_error(&self, error: ChainError) {
        lock(&self.shared.live)
            .retain(|tx| tx.send(Err(error.clone())).is_ok());
    }

    /// Close every live stream from the node side.
    pub fn drop_live(&self) {
        lock(&self.shared.live).clear();
    }

    /// Wait until at least `n` subscriptions are registered.
    pub async fn wait_for_active(&self, n: usize) {
        loop {
            let notified = self.shared.changed.notified();
            if self.active_subscriptions() >= n {
                return;
            }
            notified.await;
        }
    }

    /// Wait until no subscription is registered.
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.shared.changed.notified();
            if self.active_subscriptions() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ChainClient for ScriptedChainClient {
    async fn current_height(&self) -> Result<u64, ChainError> {
        if self.shared.fail_height.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("height unavailable".into()));
        }
        Ok(self.shared.height.load(Ordering::SeqCst))
    }

    async fn query_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError> {
        let from = filter.get_from_block().unwrap_or(0);
        let to = filter.get_to_block().unwrap_or(u64::MAX);
        lock(&self.shared.requested_ranges).push((from, to));
        if matches!(*lock(&self.shared.fail_queries_from), Some(b) if from >= b)
        {
            return Err(ChainError::Transport(format!(
                "query {from}..={to} rejected"
            )));
        }
        let mut logs: Vec<Log> = lock(&self.shared.history)
            .iter()
            .filter(|l| {
                l.block_number.is_some_and(|b| b >= from && b <= to)
            })
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(logs)
    }

    async fn subscribe_logs(
        &self,
        _filter: &Filter,
    ) -> Result<LogSubscription, ChainError> {
        lock(&self.shared.attempts).push(Instant::now());
        let outcome = lock(&self.shared.script)
            .pop_front()
            .unwrap_or(SubscribeOutcome::Open);
        if let SubscribeOutcome::Fail(reason) = outcome {
            return Err(ChainError::Subscription(reason));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared.live).push(tx);
        self.shared.active.fetch_add(1, Ordering::SeqCst);
        self.shared.changed.notify_waiters();
        let shared = self.shared.clone();
        Ok(LogSubscription::new(UnboundedReceiverStream::new(rx).boxed())
            .on_close(move || {
                shared.active.fetch_sub(1, Ordering::SeqCst);
                shared.changed.notify_waiters();
            }))
    }
}
