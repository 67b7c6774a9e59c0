use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::{EventStore, StoreError};
use crate::{db::Db, utils::uint256::DbU256};

/// One `FeesCollected` emission, the unit the pipeline carries and stores.
///
/// Addresses and hashes are lowercase `0x` hex. Fees serialise as decimal
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCollectedEvent {
    pub token: String,
    pub integrator: String,
    pub integrator_fee: DbU256,
    pub protocol_fee: DbU256,
    pub transaction_hash: String,
    pub block_number: u64,
}

#[derive(Debug, FromRow)]
struct FeeCollectedRow {
    token: String,
    integrator: String,
    integrator_fee: DbU256,
    protocol_fee: DbU256,
    transaction_hash: String,
    block_number: i64,
}

impl TryFrom<FeeCollectedRow> for FeeCollectedEvent {
    type Error = StoreError;

    fn try_from(row: FeeCollectedRow) -> Result<Self, Self::Error> {
        let block_number = u64::try_from(row.block_number).map_err(|_| {
            StoreError::Database(format!(
                "negative block_number {} for {}",
                row.block_number, row.transaction_hash
            ))
        })?;
        Ok(Self {
            token: row.token,
            integrator: row.integrator,
            integrator_fee: row.integrator_fee,
            protocol_fee: row.protocol_fee,
            transaction_hash: row.transaction_hash,
            block_number,
        })
    }
}

fn block_to_i64(block_number: u64) -> Result<i64, StoreError> {
    i64::try_from(block_number).map_err(|_| {
        StoreError::Database(format!(
            "block_number {block_number} exceeds BIGINT"
        ))
    })
}

/// `EventStore` backed by the `fee_collected_events` table.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    db: Db,
}

impl PgEventStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn find_by_tx_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<FeeCollectedEvent>, StoreError> {
        let row = sqlx::query_as::<_, FeeCollectedRow>(
            r#"
            SELECT token, integrator, integrator_fee, protocol_fee,
                   transaction_hash, block_number
            FROM fee_collected_events
            WHERE transaction_hash = $1
        "#,
        )
        .bind(tx_hash)
        .fetch_optional(self.pool())
        .await?;
        row.map(FeeCollectedEvent::try_from).transpose()
    }

    async fn insert(&self, event: &FeeCollectedEvent) -> Result<(), StoreError> {
        // No ON CONFLICT: the primary key violation is how a racing
        // duplicate is reported back to the sink.
        sqlx::query(
            r#"
            INSERT INTO fee_collected_events
                (transaction_hash, token, integrator, integrator_fee, protocol_fee, block_number)
            VALUES ($1, $2, $3, $4, $5, $6)
        "#,
        )
        .bind(&event.transaction_hash)
        .bind(&event.token)
        .bind(&event.integrator)
        .bind(event.integrator_fee)
        .bind(event.protocol_fee)
        .bind(block_to_i64(event.block_number)?)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn max_block_number(&self) -> Result<Option<u64>, StoreError> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(block_number) FROM fee_collected_events",
        )
        .fetch_one(self.pool())
        .await?;
        max.map(|b| {
            u64::try_from(b).map_err(|_| {
                StoreError::Database(format!("negative max block_number {b}"))
            })
        })
        .transpose()
    }

    async fn find_by_integrator(
        &self,
        integrator: &str,
    ) -> Result<Vec<FeeCollectedEvent>, StoreError> {
        let rows = sqlx::query_as::<_, FeeCollectedRow>(
            r#"
            SELECT token, integrator, integrator_fee, protocol_fee,
                   transaction_hash, block_number
            FROM fee_collected_events
            WHERE integrator = $1
            ORDER BY block_number ASC, transaction_hash ASC
        "#,
        )
        .bind(integrator)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(FeeCollectedEvent::try_from).collect()
    }
}
