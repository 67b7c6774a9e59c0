//! Fee event ingestion: a resumable backfill and a live subscription merged
//! into one stream and written once per transaction hash.

pub mod checkpoint;
pub mod codec;
pub mod error;
pub mod historical;
pub mod merge;
pub mod pipeline;
pub mod realtime;
pub mod sink;

pub use checkpoint::Checkpoint;
pub use error::{
    DecodeError, FetchError, IngestError, MergeError, PersistError,
    SubscriptionExhausted,
};
pub use historical::HistoricalFetcher;
pub use merge::{MergedStream, Source, Sourced, StreamMerger, merge};
pub use pipeline::{IngestOptions, IngestReport, Ingestor};
pub use realtime::{RealtimeSubscriber, RetryPolicy};
pub use sink::{DedupSink, PersistOutcome};
