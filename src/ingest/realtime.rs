//! Live `FeesCollected` feed with bounded resubscription.
//!
//! The subscriber is an explicit state machine driven by `stream::unfold`:
//!
//! ```text
//! Connecting --ok--> Delivering --event--> Delivering (failures reset)
//!     |                  |
//!     +--err--+   +--err/closed
//!             v   v
//!          BackingOff (attempt x base) --> Connecting
//!             |
//!   attempt == max --> Exhausted --> Closed
//! ```
//!
//! Cancellation moves any state straight to `Closed`. The live handle is only
//! ever owned by `Delivering`, so leaving that state drops it and deregisters
//! the listener.

use std::{sync::Arc, time::Duration};

use alloy::{primitives::Address, rpc::types::Filter};
use futures::{
    StreamExt,
    stream::{self, BoxStream},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{codec, error::SubscriptionExhausted};
use crate::{
    contract::{ChainClient, LogSubscription, fees_collected_filter},
    repo::FeeCollectedEvent,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failed attempts tolerated before giving up.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the `attempt`-th consecutive failure.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

enum SubscriberState {
    Connecting {
        failures: u32,
    },
    Delivering {
        sub: LogSubscription,
        failures: u32,
    },
    BackingOff {
        failures: u32,
        delay: Duration,
    },
    Exhausted {
        attempts: u32,
        last_error: String,
    },
    Closed,
}

pub struct RealtimeSubscriber {
    client: Arc<dyn ChainClient>,
    filter: Filter,
    policy: RetryPolicy,
    cancel: CancellationToken,
    attached: CancellationToken,
    state: SubscriberState,
}

impl RealtimeSubscriber {
    pub fn new(
        client: Arc<dyn ChainClient>,
        contract: Address,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            filter: fees_collected_filter(contract),
            policy,
            cancel,
            attached: CancellationToken::new(),
            state: SubscriberState::Connecting { failures: 0 },
        }
    }

    /// Fires once the first live subscription is registered, or once the
    /// subscriber stops trying (exhausted or cancelled).
    pub fn attached(&self) -> CancellationToken {
        self.attached.clone()
    }

    /// Unbounded feed of decoded events. Ends after a single
    /// `SubscriptionExhausted`, or silently on cancellation.
    pub fn subscribe(
        self,
    ) -> BoxStream<'static, Result<FeeCollectedEvent, SubscriptionExhausted>>
    {
        stream::unfold(self, |mut machine| async move {
            let item = machine.next_item().await?;
            Some((item, machine))
        })
        .boxed()
    }

    async fn next_item(
        &mut self,
    ) -> Option<Result<FeeCollectedEvent, SubscriptionExhausted>> {
        loop {
            let state =
                std::mem::replace(&mut self.state, SubscriberState::Closed);
            self.state = match state {
                SubscriberState::Connecting { failures } => {
                    let attempt = failures + 1;
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => SubscriberState::Closed,
                        res = self.client.subscribe_logs(&self.filter) => match res {
                            Ok(sub) => {
                                info!(attempt, "Real-time subscription established");
                                self.attached.cancel();
                                SubscriberState::Delivering { sub, failures }
                            }
                            Err(e) => self.after_failure(attempt, e.to_string()),
                        },
                    }
                }
                SubscriberState::Delivering { mut sub, failures } => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => SubscriberState::Closed,
                        next = sub.next() => match next {
                            Some(Ok(log)) => match codec::decode(&log) {
                                Ok(event) => {
                                    self.state = SubscriberState::Delivering { sub, failures: 0 };
                                    return Some(Ok(event));
                                }
                                Err(e) => {
                                    warn!(
                                        block = ?log.block_number,
                                        tx_hash = ?log.transaction_hash,
                                        error = %e,
                                        "Skipping undecodable live log"
                                    );
                                    SubscriberState::Delivering { sub, failures }
                                }
                            },
                            Some(Err(e)) => {
                                drop(sub);
                                self.after_failure(failures + 1, e.to_string())
                            }
                            None => {
                                drop(sub);
                                self.after_failure(
                                    failures + 1,
                                    "subscription stream closed".to_string(),
                                )
                            }
                        },
                    }
                }
                SubscriberState::BackingOff { failures, delay } => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => SubscriberState::Closed,
                        _ = tokio::time::sleep(delay) => SubscriberState::Connecting { failures },
                    }
                }
                SubscriberState::Exhausted {
                    attempts,
                    last_error,
                } => {
                    self.attached.cancel();
                    return Some(Err(SubscriptionExhausted {
                        attempts,
                        last_error,
                    }));
                }
                SubscriberState::Closed => {
                    self.attached.cancel();
                    return None;
                }
            };
        }
    }

    fn after_failure(&self, attempt: u32, error: String) -> SubscriberState {
        if attempt >= self.policy.max_attempts {
            error!(attempt, error = %error, "Real-time subscription exhausted retries");
            return SubscriberState::Exhausted {
                attempts: attempt,
                last_error: error,
            };
        }
        let delay = self.policy.delay_for(attempt);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Real-time subscription failed, backing off"
        );
        SubscriberState::BackingOff {
            failures: attempt,
            delay,
        }
    }
}
