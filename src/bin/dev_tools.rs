use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::Result;
use fee_indexer::{
    config,
    contract::{ChainClient, providers::AlloyChainClient},
    db::Db,
    ingest::{Checkpoint, DedupSink, HistoricalFetcher, PersistOutcome},
    repo::{EventStore, PgEventStore},
};
use futures::StreamExt;

#[derive(Parser)]
#[command(
    name = "dev-tools",
    about = "Operator utilities: chain probe, checkpoint, manual backfill"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the latest block number reported by the node
    Height {},
    /// Print the latest persisted block and the next backfill start
    Checkpoint {},
    /// Apply database migrations
    Migrate {},
    /// Dump stored events for an integrator as JSON
    Events {
        /// Integrator address (0x-prefixed)
        integrator: String,
    },
    /// Backfill an explicit inclusive block range through the dedup sink
    Backfill {
        #[arg(long)]
        from: u64,
        #[arg(long)]
        to: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = fee_indexer::logging::init();
    let cli = Cli::parse();
    let cfg = config::init_from_env()?;

    match cli.command {
        Commands::Height {} => {
            let chain = AlloyChainClient::connect(&cfg.ws_rpc_url, false).await?;
            let height = chain.current_height().await?;
            println!("Latest block number: {height}");
            Ok(())
        }
        Commands::Checkpoint {} => {
            let (db, store) = open_store(cfg).await?;
            let checkpoint = Checkpoint::new(store);
            let latest = checkpoint.latest_persisted_block().await?;
            let next = checkpoint.resume_from(cfg.ingest.start_block).await?;
            match latest {
                Some(b) => println!("Latest persisted block: {b}"),
                None => println!("No events persisted yet"),
            }
            println!("Next backfill starts at: {next}");
            db.close().await;
            Ok(())
        }
        Commands::Migrate {} => {
            let db = Db::connect(&cfg.database_url, 1).await?;
            fee_indexer::db::run_migrations(db.pool()).await?;
            println!("Migrations applied");
            db.close().await;
            Ok(())
        }
        Commands::Events { integrator } => {
            let (db, store) = open_store(cfg).await?;
            let events =
                store.find_by_integrator(&integrator.to_lowercase()).await?;
            println!("{}", serde_json::to_string_pretty(&events)?);
            db.close().await;
            Ok(())
        }
        Commands::Backfill { from, to } => backfill(cfg, from, to).await,
    }
}

async fn open_store(
    cfg: &config::Config,
) -> Result<(Db, Arc<dyn EventStore>)> {
    let db = Db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    let store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(db.clone()));
    Ok((db, store))
}

async fn backfill(cfg: &config::Config, from: u64, to: u64) -> Result<()> {
    let (db, store) = open_store(cfg).await?;
    let chain = Arc::new(
        AlloyChainClient::connect(&cfg.ws_rpc_url, cfg.flags.print_raw_logs)
            .await?,
    );
    let fetcher = HistoricalFetcher::new(
        chain,
        cfg.fee_collector,
        cfg.ingest.log_chunk_size,
    );
    let sink = DedupSink::new(store);

    let (mut persisted, mut existing, mut failed) = (0u64, 0u64, 0u64);
    let mut events = fetcher.fetch_range(from, to);
    while let Some(item) = events.next().await {
        let event = item?;
        match sink.persist_if_new(&event).await {
            Ok(PersistOutcome::Persisted) => persisted += 1,
            Ok(PersistOutcome::AlreadyExists) => existing += 1,
            Err(e) => {
                failed += 1;
                tracing::warn!(error = %e, "Failed to persist fee event");
            }
        }
    }
    tracing::info!(from, to, persisted, existing, failed, "Backfill finished");
    println!(
        "Backfilled {from}..={to}: {persisted} new, {existing} already stored, {failed} failed"
    );
    db.close().await;
    Ok(())
}
