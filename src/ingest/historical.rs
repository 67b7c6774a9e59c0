use std::sync::Arc;

use alloy::{primitives::Address, rpc::types::Log};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use tracing::{debug, info, warn};

use super::{codec, error::FetchError};
use crate::{
    contract::{ChainClient, fees_collected_filter},
    repo::FeeCollectedEvent,
};

/// Bounded backfill over `eth_getLogs`, paged in fixed-size block windows.
#[derive(Clone)]
pub struct HistoricalFetcher {
    client: Arc<dyn ChainClient>,
    contract: Address,
    chunk_size: u64,
}

impl HistoricalFetcher {
    pub fn new(
        client: Arc<dyn ChainClient>,
        contract: Address,
        chunk_size: u64,
    ) -> Self {
        Self {
            client,
            contract,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Events in `from..=to`, page by page, in non-decreasing block order.
    ///
    /// Empty when `from > to`. A failed page yields one `FetchError` and
    /// ends the sequence; nothing from that page is emitted.
    pub fn fetch_range(
        &self,
        from: u64,
        to: u64,
    ) -> BoxStream<'static, Result<FeeCollectedEvent, FetchError>> {
        let client = self.client.clone();
        let contract = self.contract;
        let chunk = self.chunk_size;
        if from <= to {
            info!(from, to, chunk, "Starting historical backfill");
        }

        stream::unfold(Some(from), move |cursor| {
            let client = client.clone();
            async move {
                let start = cursor?;
                if start > to {
                    return None;
                }
                let end = start.saturating_add(chunk - 1).min(to);
                let filter = fees_collected_filter(contract)
                    .from_block(start)
                    .to_block(end);
                match client.query_logs(&filter).await {
                    Ok(logs) => {
                        debug!(from = start, to = end, logs = logs.len(), "Fetched log page");
                        let next = (end < to).then(|| end + 1);
                        Some((Ok(decode_page(logs)), next))
                    }
                    Err(source) => Some((
                        Err(FetchError::Range {
                            from: start,
                            to: end,
                            source,
                        }),
                        None,
                    )),
                }
            }
        })
        .flat_map(|page| {
            let items: Vec<_> = match page {
                Ok(events) => events.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
        .boxed()
    }
}

/// Decode one page, ordered by (block, log index); undecodable logs are
/// logged and skipped.
fn decode_page(mut logs: Vec<Log>) -> Vec<FeeCollectedEvent> {
    logs.sort_by_key(|l| (l.block_number, l.log_index));
    logs.iter()
        .filter_map(|log| match codec::decode(log) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(
                    block = ?log.block_number,
                    tx_hash = ?log.transaction_hash,
                    error = %e,
                    "Skipping undecodable historical log"
                );
                None
            }
        })
        .collect()
}
