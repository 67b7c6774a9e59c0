use alloy::{
    providers::{Provider, ProviderBuilder, RootProvider, WsConnect},
    rpc::types::{Filter, Log},
};
use async_trait::async_trait;
use eyre::Result;
use futures::StreamExt;

use super::client::{ChainClient, ChainError, LogSubscription};

/// Public read-only WebSocket provider.
pub type WsProvider = RootProvider;

pub async fn ws_public(url: &str) -> Result<WsProvider> {
    let ws = WsConnect::new(url);
    let provider = ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_ws(ws)
        .await?;
    Ok(provider)
}

/// `ChainClient` over two WebSocket connections: one carries the live
/// subscription, the other serves height and range queries so a slow
/// backfill page never stalls the push channel.
#[derive(Clone)]
pub struct AlloyChainClient {
    ws_listener: WsProvider,
    ws_reader: WsProvider,
    print_raw_logs: bool,
}

impl AlloyChainClient {
    pub async fn connect(url: &str, print_raw_logs: bool) -> Result<Self> {
        let ws_listener = ws_public(url).await?;
        let ws_reader = ws_public(url).await?;
        tracing::info!(url, "Connected chain providers");
        Ok(Self {
            ws_listener,
            ws_reader,
            print_raw_logs,
        })
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn current_height(&self) -> Result<u64, ChainError> {
        self.ws_reader
            .get_block_number()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))
    }

    async fn query_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError> {
        self.ws_reader
            .get_logs(filter)
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))
    }

    async fn subscribe_logs(
        &self,
        filter: &Filter,
    ) -> Result<LogSubscription, ChainError> {
        let sub = self
            .ws_listener
            .subscribe_logs(filter)
            .await
            .map_err(|e| ChainError::Subscription(e.to_string()))?;
        let id = *sub.local_id();
        let print_raw_logs = self.print_raw_logs;
        let stream = sub
            .into_stream()
            .inspect(move |log| {
                if print_raw_logs {
                    tracing::debug!(?log, "RAW LOG");
                }
            })
            .map(Ok)
            .boxed();
        let provider = self.ws_listener.clone();
        Ok(LogSubscription::new(stream).on_close(move || {
            match provider.unsubscribe(id) {
                Ok(()) => tracing::debug!(%id, "Log subscription removed"),
                Err(e) => {
                    tracing::debug!(%id, error = %e, "Unsubscribe failed")
                }
            }
        }))
    }
}
