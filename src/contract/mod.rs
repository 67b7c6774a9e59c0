pub mod bindings;
pub mod client;
pub mod providers;
#[cfg(any(test, feature = "test-utils"))]
pub mod scripted;

pub use bindings::FeeCollector::FeesCollected;
pub use client::{ChainClient, ChainError, LogSubscription};

use alloy::{primitives::Address, rpc::types::Filter, sol_types::SolEvent};

/// Log filter for `FeesCollected` emitted by `contract`.
pub fn fees_collected_filter(contract: Address) -> Filter {
    Filter::new()
        .address(contract)
        .event_signature(FeesCollected::SIGNATURE_HASH)
}
