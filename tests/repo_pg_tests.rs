//! Round trip against a real Postgres. Needs `DATABASE_URL`:
//! `cargo test --test repo_pg_tests -- --ignored`

mod common;

use common::stored_event;
use fee_indexer::{
    db::{Db, run_migrations},
    ingest::{DedupSink, PersistOutcome},
    repo::{EventStore, PgEventStore, StoreError},
    utils::uint256::DbU256,
};
use std::sync::Arc;

/// Connect, migrate and clear rows for `integrator`.
async fn store(integrator: &str) -> (Db, PgEventStore) {
    dotenv::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    let db = Db::connect(&url, 2).await.unwrap();
    run_migrations(db.pool()).await.unwrap();
    sqlx::query("DELETE FROM fee_collected_events WHERE integrator = $1")
        .bind(integrator)
        .execute(db.pool())
        .await
        .unwrap();
    (db.clone(), PgEventStore::new(db))
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn insert_find_and_checkpoint() {
    let mut big = stored_event(19_000_001, 1);
    let (db, repo) = store(&big.integrator).await;

    big.integrator_fee = DbU256(fee_indexer::utils::uint256::U256::MAX);
    repo.insert(&big).await.unwrap();
    repo.insert(&stored_event(18_999_999, 2)).await.unwrap();

    let found = repo.find_by_tx_hash(&big.transaction_hash).await.unwrap();
    assert_eq!(found, Some(big.clone()));
    assert!(repo.max_block_number().await.unwrap() >= Some(19_000_001));

    let listed = repo.find_by_integrator(&big.integrator).await.unwrap();
    let blocks: Vec<_> = listed.iter().map(|e| e.block_number).collect();
    assert_eq!(blocks, vec![18_999_999, 19_000_001]);

    let err = repo.insert(&big).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey(_)), "{err:?}");
    db.close().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn sink_resolves_duplicates_against_the_table() {
    let mut ev = stored_event(500, 5);
    ev.integrator = "0x00000000000000000000000000000000000000aa".into();
    let (db, repo) = store(&ev.integrator).await;
    let sink = DedupSink::new(Arc::new(repo));
    let (a, b) = tokio::join!(sink.persist_if_new(&ev), sink.persist_if_new(&ev));
    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == PersistOutcome::AlreadyExists);
    assert_eq!(
        outcomes,
        vec![PersistOutcome::Persisted, PersistOutcome::AlreadyExists]
    );
    db.close().await;
}
