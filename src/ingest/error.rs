//! Error taxonomy of the ingestion pipeline.
//!
//! Decode and persist failures are event-local. Fetch failures end the
//! backfill attempt, subscription exhaustion ends the real-time side.

use thiserror::Error;

use crate::{contract::ChainError, repo::StoreError};

/// A raw log that could not be turned into a fee event.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has no topics")]
    MissingTopic,
    #[error("unexpected event signature {0}")]
    UnexpectedSignature(String),
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("log was removed by a reorg")]
    Removed,
    #[error("abi decode failed: {0}")]
    Abi(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The upper bound snapshot could not be taken.
    #[error("chain height lookup failed: {0}")]
    Height(#[source] ChainError),
    #[error("historical fetch of blocks {from}..={to} failed: {source}")]
    Range {
        from: u64,
        to: u64,
        #[source]
        source: ChainError,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("real-time subscription gave up after {attempts} attempts: {last_error}")]
pub struct SubscriptionExhausted {
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, Error)]
#[error("persisting {tx_hash} failed: {source}")]
pub struct PersistError {
    pub tx_hash: String,
    #[source]
    pub source: StoreError,
}

/// Source-level failure surfaced on the merged stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    SubscriptionExhausted(#[from] SubscriptionExhausted),
}

/// Failures that stop the pipeline before or outside the merged stream.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("checkpoint lookup failed: {0}")]
    Checkpoint(#[source] StoreError),
    #[error(transparent)]
    SubscriptionExhausted(#[from] SubscriptionExhausted),
}
