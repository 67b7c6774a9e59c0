pub mod fee_repo;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use fee_repo::{FeeCollectedEvent, PgEventStore};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryEventStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The unique key already holds a row; expected when two sources race.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                StoreError::DuplicateKey(db.message().to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// Durable home of fee events, keyed by transaction hash.
///
/// Shared by the checkpoint, the sink and the read endpoint; pass it down
/// as `Arc<dyn EventStore>`.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_by_tx_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<FeeCollectedEvent>, StoreError>;

    /// Insert a new row; a row with the same transaction hash yields
    /// `StoreError::DuplicateKey`.
    async fn insert(&self, event: &FeeCollectedEvent) -> Result<(), StoreError>;

    /// Highest persisted block number, `None` when empty.
    async fn max_block_number(&self) -> Result<Option<u64>, StoreError>;

    /// All events for `integrator`, ordered by block number.
    async fn find_by_integrator(
        &self,
        integrator: &str,
    ) -> Result<Vec<FeeCollectedEvent>, StoreError>;
}
