//! Runs the read API next to the ingestion pipeline.
//!
//! The API outlives ingestion: when ingestion stops (live retries exhausted)
//! the endpoint keeps serving stored events until shutdown. When the API
//! stops, ingestion is cancelled with it.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::ingest::{IngestError, IngestReport};

/// Drive `api` and `ingest` to completion under one `shutdown` token.
///
/// Both futures are expected to watch tokens derived from `shutdown`.
pub async fn supervise<A, I>(
    api: A,
    ingest: I,
    shutdown: CancellationToken,
) -> (eyre::Result<()>, Result<IngestReport, IngestError>)
where
    A: Future<Output = eyre::Result<()>>,
    I: Future<Output = Result<IngestReport, IngestError>>,
{
    tokio::join!(
        async {
            let res = api.await;
            if let Err(e) = &res {
                error!(error = %e, "Read API stopped, cancelling ingestion");
            }
            shutdown.cancel();
            res
        },
        async {
            let res = ingest.await.and_then(IngestReport::into_result);
            match &res {
                Err(e) if !shutdown.is_cancelled() => {
                    error!(error = %e, "Ingestion stopped, read API keeps serving")
                }
                Err(_) => {}
                Ok(report) => info!(?report, "Ingestion finished"),
            }
            res
        },
    )
}
