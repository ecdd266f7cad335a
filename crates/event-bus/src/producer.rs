//! Process-wide asynchronous producer.
//!
//! Records enter through a bounded input channel. A dispatch task takes them
//! in order and delivers up to [`MAX_IN_FLIGHT`] of them concurrently. Each
//! record is acknowledged on its own oneshot channel as soon as its delivery
//! completes; every failure is also forwarded to a shared error channel that
//! a background task drains and logs for the lifetime of the process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::broker::{Broker, DeliveryPosition};
use crate::envelope::PublishEnvelope;
use crate::error::{PublishError, Result};

/// Deliveries awaiting the broker at once.
pub const MAX_IN_FLIGHT: usize = 64;

struct PendingRecord {
    envelope: PublishEnvelope,
    ack: oneshot::Sender<Result<DeliveryPosition>>,
}

/// A failed delivery, as seen by the background drain.
#[derive(Debug, Clone)]
struct DeliveryFailure {
    topic: String,
    key: Option<String>,
    error: PublishError,
}

/// Cloneable handle onto the producer's input pathway.
#[derive(Debug, Clone)]
pub struct ProducerHandle {
    input: mpsc::Sender<PendingRecord>,
}

impl std::fmt::Debug for PendingRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRecord")
            .field("topic", &self.envelope.topic)
            .finish_non_exhaustive()
    }
}

impl ProducerHandle {
    /// Waits for room on the input pathway and enqueues the record.
    ///
    /// Cancel-safe: if the returned future is dropped before it completes,
    /// the record was not enqueued.
    pub async fn enqueue(&self, envelope: PublishEnvelope) -> Result<PendingAck> {
        let (ack, rx) = oneshot::channel();
        self.input
            .send(PendingRecord { envelope, ack })
            .await
            .map_err(|_| PublishError::Closed)?;
        Ok(PendingAck { rx })
    }

    pub fn is_closed(&self) -> bool {
        self.input.is_closed()
    }
}

/// Acknowledgement of one enqueued record.
#[derive(Debug)]
pub struct PendingAck {
    rx: oneshot::Receiver<Result<DeliveryPosition>>,
}

impl PendingAck {
    /// Resolves to the delivery position or the delivery error.
    pub async fn wait(self) -> Result<DeliveryPosition> {
        self.rx.await.unwrap_or(Err(PublishError::Dropped))
    }
}

/// Owns the dispatch task and the background error drain.
///
/// Started once at process startup; [`ProducerRuntime::shutdown`] stops
/// both tasks. Dropping the runtime without shutting down aborts them.
#[derive(Debug)]
pub struct ProducerRuntime {
    handle: ProducerHandle,
    stop: watch::Sender<bool>,
    dispatcher: Option<JoinHandle<()>>,
    drain: Option<JoinHandle<u64>>,
}

impl ProducerRuntime {
    /// Spawns the producer tasks on the current tokio runtime.
    ///
    /// `capacity` bounds the input pathway; enqueueing waits while it is full.
    pub fn start(broker: Arc<dyn Broker>, capacity: usize) -> Self {
        let (input, records) = mpsc::channel(capacity.max(1));
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);

        let dispatcher = tokio::spawn(dispatch(broker, records, failures_tx, stop_rx));
        let drain = tokio::spawn(drain_failures(failures_rx));

        tracing::info!(capacity, "producer runtime started");

        Self {
            handle: ProducerHandle { input },
            stop,
            dispatcher: Some(dispatcher),
            drain: Some(drain),
        }
    }

    pub fn handle(&self) -> ProducerHandle {
        self.handle.clone()
    }

    /// Closes the input pathway, flushes queued records for up to `grace`,
    /// then stops the background drain.
    ///
    /// Returns the number of delivery errors drained over the runtime's life.
    pub async fn shutdown(mut self, grace: Duration) -> u64 {
        let _ = self.stop.send(true);

        if let Some(mut dispatcher) = self.dispatcher.take() {
            if tokio::time::timeout(grace, &mut dispatcher).await.is_err() {
                tracing::warn!(?grace, "producer did not flush in time, aborting");
                dispatcher.abort();
                let _ = dispatcher.await;
            }
        }

        // The dispatcher and its deliveries held the only failure senders, so
        // the drain ends now.
        let drained = match self.drain.take() {
            Some(drain) => drain.await.unwrap_or(0),
            None => 0,
        };

        tracing::info!(drained_errors = drained, "producer runtime stopped");
        drained
    }
}

impl Drop for ProducerRuntime {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }
    }
}

async fn dispatch(
    broker: Arc<dyn Broker>,
    mut records: mpsc::Receiver<PendingRecord>,
    failures: mpsc::UnboundedSender<DeliveryFailure>,
    mut stop: watch::Receiver<bool>,
) {
    let permits = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let mut in_flight = JoinSet::new();
    let mut stopping = false;
    loop {
        let record = tokio::select! {
            record = records.recv() => record,
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "delivery task failed");
                }
                continue;
            }
            changed = stop.changed(), if !stopping => {
                // Stop accepting new records; queued ones are still delivered.
                if changed.is_err() || *stop.borrow() {
                    stopping = true;
                    records.close();
                }
                continue;
            }
        };

        let Some(PendingRecord { envelope, ack }) = record else {
            break;
        };
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };

        let broker = Arc::clone(&broker);
        let failures = failures.clone();
        in_flight.spawn(async move {
            let result = broker.deliver(&envelope).await;
            if let Err(error) = &result {
                let _ = failures.send(DeliveryFailure {
                    topic: envelope.topic.clone(),
                    key: envelope.key.clone(),
                    error: error.clone(),
                });
            }
            // The publisher may have stopped waiting; that is fine.
            let _ = ack.send(result);
            drop(permit);
        });
    }

    while in_flight.join_next().await.is_some() {}
}

async fn drain_failures(mut failures: mpsc::UnboundedReceiver<DeliveryFailure>) -> u64 {
    let mut drained = 0;
    while let Some(failure) = failures.recv().await {
        drained += 1;
        metrics::counter!("event_bus_drained_errors_total").increment(1);
        tracing::error!(
            topic = %failure.topic,
            key = failure.key.as_deref().unwrap_or(""),
            error = %failure.error,
            "failed to write message"
        );
    }
    drained
}
