use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Transport(String),
    #[error("subscription error: {0}")]
    Subscription(String),
}

/// Remote chain node as seen by the ingestion core.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block height known to the node.
    async fn current_height(&self) -> Result<u64, ChainError>;

    /// Logs matching `filter`; the filter carries contract, topic and the
    /// inclusive block range.
    async fn query_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError>;

    /// Live push source of logs matching `filter`.
    async fn subscribe_logs(
        &self,
        filter: &Filter,
    ) -> Result<LogSubscription, ChainError>;
}

/// A live log subscription. Dropping it deregisters the listener upstream,
/// whichever path the owner leaves through.
pub struct LogSubscription {
    stream: BoxStream<'static, Result<Log, ChainError>>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl LogSubscription {
    pub fn new(stream: BoxStream<'static, Result<Log, ChainError>>) -> Self {
        Self {
            stream,
            on_close: None,
        }
    }

    /// Run `hook` exactly once when the subscription is dropped.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }
}

impl Stream for LogSubscription {
    type Item = Result<Log, ChainError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl fmt::Debug for LogSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSubscription")
            .field("open", &self.on_close.is_some())
            .finish()
    }
}
