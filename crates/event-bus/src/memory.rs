//! In-process broker for tests and single-node demos.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::History;
use tokio::sync::Notify;

use crate::broker::{Broker, DeliveryPosition};
use crate::envelope::PublishEnvelope;
use crate::error::{PublishError, Result};

#[derive(Debug, Default)]
struct InMemoryBrokerState {
    records: History<(DeliveryPosition, PublishEnvelope)>,
    next_offsets: HashMap<String, i64>,
    attempts: usize,
    fail_on_deliver: bool,
    hold_after: Option<usize>,
    delay: Option<Duration>,
}

/// Broker keeping delivered records in memory, one partition per topic.
///
/// Only the latest records are kept, [`common::DEFAULT_RETENTION`] unless
/// set with [`InMemoryBroker::retaining`]. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<InMemoryBrokerState>>,
    attempted: Arc<Notify>,
}

enum Decision {
    Deliver(Option<Duration>),
    Fail,
    Hold,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the latest `retention` delivered records.
    pub fn retaining(self, retention: usize) -> Self {
        self.lock().records = History::new(retention);
        self
    }

    /// Configures every delivery to fail.
    pub fn set_fail_on_deliver(&self, fail: bool) {
        self.lock().fail_on_deliver = fail;
    }

    /// Accepts the first `n` attempts, then never completes another one,
    /// like a broker that stopped responding.
    pub fn hold_after(&self, n: usize) {
        self.lock().hold_after = Some(n);
    }

    /// Lets later attempts complete again. Attempts already held stay held.
    pub fn release_hold(&self) {
        self.lock().hold_after = None;
    }

    /// Delays each delivery, to simulate a slow broker.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Retained records, in delivery order.
    pub fn records(&self) -> Vec<PublishEnvelope> {
        self.lock().records.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Records delivered so far, including ones no longer retained.
    pub fn record_count(&self) -> usize {
        self.lock().records.total()
    }

    /// Delivery attempts, including failed and held ones.
    pub fn attempt_count(&self) -> usize {
        self.lock().attempts
    }

    /// Waits until at least `n` delivery attempts were made.
    pub async fn wait_for_attempts(&self, n: usize) {
        loop {
            let attempted = self.attempted.notified();
            if self.attempt_count() >= n {
                return;
            }
            attempted.await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryBrokerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn decide(&self) -> Decision {
        let mut state = self.lock();
        state.attempts += 1;
        if state.hold_after.is_some_and(|n| state.attempts > n) {
            Decision::Hold
        } else if state.fail_on_deliver {
            Decision::Fail
        } else {
            Decision::Deliver(state.delay)
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn deliver(&self, envelope: &PublishEnvelope) -> Result<DeliveryPosition> {
        let decision = self.decide();
        self.attempted.notify_waiters();

        match decision {
            Decision::Hold => std::future::pending().await,
            Decision::Fail => Err(PublishError::Broker(format!(
                "topic '{}' is unavailable",
                envelope.topic
            ))),
            Decision::Deliver(delay) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let mut state = self.lock();
                let next = state.next_offsets.entry(envelope.topic.clone()).or_insert(0);
                let position = DeliveryPosition {
                    partition: 0,
                    offset: *next,
                };
                *next += 1;
                state.records.push((position, envelope.clone()));
                Ok(position)
            }
        }
    }
}
