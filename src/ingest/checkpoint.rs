use std::sync::Arc;

use crate::repo::{EventStore, StoreError};

/// Resume point for the backfill, always read fresh from the store.
#[derive(Clone)]
pub struct Checkpoint {
    store: Arc<dyn EventStore>,
}

impl Checkpoint {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Highest block number among persisted events.
    pub async fn latest_persisted_block(
        &self,
    ) -> Result<Option<u64>, StoreError> {
        self.store.max_block_number().await
    }

    /// First block the next backfill should request.
    pub async fn resume_from(
        &self,
        fallback_start: u64,
    ) -> Result<u64, StoreError> {
        Ok(match self.latest_persisted_block().await? {
            Some(block) => block.saturating_add(1),
            None => fallback_start,
        })
    }
}
