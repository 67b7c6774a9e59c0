use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use super::{EventStore, FeeCollectedEvent, StoreError};

/// In-process `EventStore` with the same uniqueness rule as the table.
///
/// Test double; `fail_writes` simulates an unavailable database for
/// inserts, `fail_reads` for every read.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    rows: Mutex<HashMap<String, FeeCollectedEvent>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    lookups: AtomicUsize,
    inserts: AtomicUsize,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(
        events: impl IntoIterator<Item = FeeCollectedEvent>,
    ) -> Self {
        let store = Self::new();
        {
            let mut rows = store.lock();
            for ev in events {
                rows.insert(ev.transaction_hash.clone(), ev);
            }
        }
        store
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Every stored event ordered by block then hash.
    pub fn snapshot(&self) -> Vec<FeeCollectedEvent> {
        let mut all: Vec<_> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| {
            (a.block_number, &a.transaction_hash)
                .cmp(&(b.block_number, &b.transaction_hash))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `find_by_tx_hash` calls served.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of `insert` calls attempted.
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, FeeCollectedEvent>> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn find_by_tx_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<FeeCollectedEvent>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        Ok(self.lock().get(tx_hash).cloned())
    }

    async fn insert(&self, event: &FeeCollectedEvent) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".into()));
        }
        let mut rows = self.lock();
        if rows.contains_key(&event.transaction_hash) {
            return Err(StoreError::DuplicateKey(
                event.transaction_hash.clone(),
            ));
        }
        rows.insert(event.transaction_hash.clone(), event.clone());
        Ok(())
    }

    async fn max_block_number(&self) -> Result<Option<u64>, StoreError> {
        self.check_reads()?;
        Ok(self.lock().values().map(|e| e.block_number).max())
    }

    async fn find_by_integrator(
        &self,
        integrator: &str,
    ) -> Result<Vec<FeeCollectedEvent>, StoreError> {
        self.check_reads()?;
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|e| e.integrator == integrator)
            .collect())
    }
}
