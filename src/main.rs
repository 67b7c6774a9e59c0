use std::sync::Arc;

use eyre::Result;
use fee_indexer::{
    api::{AppState, listen_app},
    contract::providers::AlloyChainClient,
    db::{Db, run_migrations},
    ingest::{IngestOptions, Ingestor},
    repo::{EventStore, PgEventStore},
    service::supervise,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config = fee_indexer::config::init_from_env()?;
    let _log_guard = fee_indexer::logging::init();

    let db = Db::connect(&config.database_url, config.db_max_connections)
        .await?;
    run_migrations(db.pool()).await?;
    let store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(db.clone()));
    let chain = Arc::new(
        AlloyChainClient::connect(
            &config.ws_rpc_url,
            config.flags.print_raw_logs,
        )
        .await?,
    );

    let shutdown = CancellationToken::new();
    let ingestor = Ingestor::new(
        chain,
        store.clone(),
        config.fee_collector,
        IngestOptions::from(&config.ingest),
    );
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl+C, shutting down.");
                on_signal.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Cannot listen for Ctrl+C"),
        }
    });

    let (api_res, ingest_res) = supervise(
        listen_app(&config.http_bind, AppState { store }, shutdown.child_token()),
        ingestor.run(shutdown.child_token()),
        shutdown.clone(),
    )
    .await;

    db.close().await;
    api_res.map_err(|e| e.wrap_err("read API stopped"))?;
    let report = ingest_res?;
    tracing::info!(?report, "Shut down cleanly");
    Ok(())
}
