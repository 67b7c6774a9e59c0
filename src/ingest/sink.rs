use std::sync::Arc;

use tracing::debug;

use super::error::PersistError;
use crate::repo::{EventStore, FeeCollectedEvent, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Persisted,
    /// A record with this transaction hash was already stored.
    AlreadyExists,
}

/// Check-then-insert writer keyed by transaction hash.
///
/// The check and the insert are not atomic; the store's unique key settles
/// any race and the loser is reported as `AlreadyExists`.
#[derive(Clone)]
pub struct DedupSink {
    store: Arc<dyn EventStore>,
}

impl DedupSink {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn persist_if_new(
        &self,
        event: &FeeCollectedEvent,
    ) -> Result<PersistOutcome, PersistError> {
        let tx_hash = &event.transaction_hash;
        let persist_err = |source| PersistError {
            tx_hash: tx_hash.clone(),
            source,
        };

        if self
            .store
            .find_by_tx_hash(tx_hash)
            .await
            .map_err(persist_err)?
            .is_some()
        {
            debug!(%tx_hash, block = event.block_number, "Event already stored");
            return Ok(PersistOutcome::AlreadyExists);
        }

        match self.store.insert(event).await {
            Ok(()) => Ok(PersistOutcome::Persisted),
            Err(StoreError::DuplicateKey(_)) => {
                debug!(%tx_hash, "Lost insert race, event already stored");
                Ok(PersistOutcome::AlreadyExists)
            }
            Err(source) => Err(persist_err(source)),
        }
    }
}
