//! Synthetic queue overload for chaos testing.
//!
//! When the `kafkaQueueProblems` flag holds `N > 0`, every published order is
//! followed by `N` extra copies of the same record. Each copy is a detached
//! task: it enqueues the record, waits for its acknowledgement, and exits.
//! Nobody joins these tasks and their outcome is never reported to the
//! request. They hold nothing but a producer handle clone, and they all end
//! once the broker acknowledges them or the producer runtime shuts down, so
//! the outstanding work is bounded by `N` per published order.

use crate::envelope::PublishEnvelope;
use crate::producer::ProducerHandle;

/// Spawns `count` fire-and-forget copies of `envelope`.
///
/// Returns immediately with the number of tasks spawned.
pub fn spawn_overload(producer: &ProducerHandle, envelope: &PublishEnvelope, count: usize) -> usize {
    for copy in 0..count {
        let producer = producer.clone();
        let envelope = envelope.clone();
        tokio::spawn(async move {
            match producer.enqueue(envelope).await {
                Ok(ack) => {
                    if let Err(e) = ack.wait().await {
                        tracing::debug!(copy, error = %e, "overload record not delivered");
                    }
                }
                Err(e) => tracing::debug!(copy, error = %e, "overload record not enqueued"),
            }
        });
    }
    metrics::counter!("event_bus_overload_records_total").increment(count as u64);
    count
}
