#![allow(dead_code)]

use std::time::Duration;

use alloy::{
    primitives::{Address, B256, Bytes, LogData, U256, address},
    rpc::types::Log,
};
use fee_indexer::{
    contract::scripted::fees_collected_log,
    ingest::{IngestOptions, RetryPolicy},
    repo::FeeCollectedEvent,
    utils::uint256::DbU256,
};

pub const CONTRACT: Address = address!("bd6c7b0d2f68c2b7805d88388319cfb6ecb50ea9");
pub const TOKEN: Address = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");
pub const INTEGRATOR: Address =
    address!("abcdef0000000000000000000000000000001234");

pub fn tx(n: u64) -> B256 {
    B256::left_padding_from(&n.to_be_bytes())
}

pub fn tx_hex(n: u64) -> String {
    format!("0x{n:064x}")
}

/// `FeesCollected` log at `block` in transaction `tx(n)`.
pub fn fee_log(block: u64, n: u64) -> Log {
    fees_collected_log(
        CONTRACT,
        block,
        tx(n),
        TOKEN,
        INTEGRATOR,
        U256::from(1_000_000_000_000_000_000u128) * U256::from(block),
        U256::from(n),
    )
}

/// Same log with the `_integratorFee` word cut off the data.
pub fn fee_log_missing_integrator_fee(block: u64, n: u64) -> Log {
    let mut log = fee_log(block, n);
    let topics = log.inner.data.topics().to_vec();
    let data = Bytes::copy_from_slice(&log.inner.data.data[32..]);
    log.inner.data = LogData::new_unchecked(topics, data);
    log
}

pub fn stored_event(block: u64, n: u64) -> FeeCollectedEvent {
    FeeCollectedEvent {
        token: format!("0x{}", hex::encode(TOKEN)),
        integrator: format!("0x{}", hex::encode(INTEGRATOR)),
        integrator_fee: DbU256::from(block),
        protocol_fee: DbU256::from(n),
        transaction_hash: tx_hex(n),
        block_number: block,
    }
}

pub fn retry(base_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(base_ms),
    }
}

pub fn options(start_block: u64, chunk_size: u64) -> IngestOptions {
    IngestOptions {
        start_block,
        chunk_size,
        retry: retry(1),
        merge_buffer: 64,
    }
}

/// Poll `cond` every few milliseconds, failing the test after 5s.
pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
