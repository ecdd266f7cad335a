//! Per-request publication of order events.

use std::time::{Duration, Instant};

use common::{CancelReason, RequestContext};
use domain::OrderResult;
use flags::{FaultInjector, KAFKA_QUEUE_PROBLEMS};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue, global};

use crate::broker::DeliveryPosition;
use crate::envelope::{ORDERS_TOPIC, PublishEnvelope};
use crate::error::{PublishError, Result};
use crate::overload::spawn_overload;
use crate::producer::ProducerHandle;

/// Instrumentation scope of producer spans.
const TRACER_NAME: &str = "checkout";

/// How a single publish attempt ended. Exactly one applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The broker acknowledged the record.
    Delivered(DeliveryPosition),
    /// The broker, or the producer, reported an error.
    Failed(PublishError),
    /// The request context ended first. `enqueued` tells whether the
    /// record made it onto the input pathway before that.
    Cancelled { reason: CancelReason, enqueued: bool },
}

/// The status recorded for a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishStatus {
    pub outcome: PublishOutcome,
    pub latency: Duration,
}

impl PublishStatus {
    pub fn success(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Delivered(_))
    }

    pub fn position(&self) -> Option<DeliveryPosition> {
        match self.outcome {
            PublishOutcome::Delivered(position) => Some(position),
            _ => None,
        }
    }

    /// The failure cause, if the attempt did not succeed.
    pub fn cause(&self) -> Option<PublishError> {
        match &self.outcome {
            PublishOutcome::Delivered(_) => None,
            PublishOutcome::Failed(e) => Some(e.clone()),
            PublishOutcome::Cancelled { reason, .. } => Some(PublishError::Interrupted(*reason)),
        }
    }

    fn outcome_label(&self) -> &'static str {
        match self.outcome {
            PublishOutcome::Delivered(_) => "delivered",
            PublishOutcome::Failed(_) => "failed",
            PublishOutcome::Cancelled { .. } => "cancelled",
        }
    }
}

/// Result of [`EventPublisher::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub status: PublishStatus,
    /// Detached overload copies spawned after the attempt.
    pub overload_records: usize,
}

/// Publishes completed orders through the shared producer.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    producer: ProducerHandle,
    faults: FaultInjector,
    topic: String,
}

impl EventPublisher {
    pub fn new(producer: ProducerHandle, faults: FaultInjector) -> Self {
        Self {
            producer,
            faults,
            topic: ORDERS_TOPIC.to_string(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes `order` and waits, bounded by `ctx`, for its outcome.
    ///
    /// Returns an error only when the order cannot be serialized; delivery
    /// problems are reported in the [`PublishStatus`].
    #[tracing::instrument(
        skip_all,
        fields(topic = %self.topic, order_id = %order.order_id, trace_id = %ctx.trace_id())
    )]
    pub async fn publish(&self, ctx: &RequestContext, order: &OrderResult) -> Result<PublishReport> {
        // The record travels in its own producer span.
        let producer = start_producer_span(ctx.trace(), &self.topic);
        let envelope = PublishEnvelope::for_order(&self.topic, order, &producer)?;

        let started = Instant::now();
        let outcome = self.send(ctx, envelope.clone()).await;
        let status = PublishStatus {
            outcome,
            latency: started.elapsed(),
        };
        record(&status);
        end_producer_span(&producer, &status);

        // A record that never got onto the queue is not followed by overload.
        let enqueued = !matches!(
            status.outcome,
            PublishOutcome::Cancelled { enqueued: false, .. }
                | PublishOutcome::Failed(PublishError::Closed)
        );
        let overload_records = if enqueued {
            self.simulate_overload(&envelope).await
        } else {
            0
        };

        Ok(PublishReport {
            status,
            overload_records,
        })
    }

    async fn send(&self, ctx: &RequestContext, envelope: PublishEnvelope) -> PublishOutcome {
        let pending = match ctx.run(self.producer.enqueue(envelope)).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => return PublishOutcome::Failed(e),
            Err(reason) => {
                return PublishOutcome::Cancelled {
                    reason,
                    enqueued: false,
                };
            }
        };

        tokio::select! {
            ack = pending.wait() => match ack {
                Ok(position) => PublishOutcome::Delivered(position),
                Err(e) => PublishOutcome::Failed(e),
            },
            reason = ctx.done() => PublishOutcome::Cancelled { reason, enqueued: true },
        }
    }

    async fn simulate_overload(&self, envelope: &PublishEnvelope) -> usize {
        let requested = self.faults.int(KAFKA_QUEUE_PROBLEMS).await;
        let Ok(count) = usize::try_from(requested) else {
            return 0;
        };
        if count == 0 {
            return 0;
        }

        tracing::warn!(
            flag = KAFKA_QUEUE_PROBLEMS,
            count,
            "overloading the producer queue"
        );
        spawn_overload(&self.producer, envelope, count)
    }
}

fn start_producer_span(parent: &Context, topic: &str) -> Context {
    let tracer = global::tracer(TRACER_NAME);
    let span = tracer
        .span_builder(format!("{topic} publish"))
        .with_kind(SpanKind::Producer)
        .with_attributes([
            KeyValue::new("peer.service", "kafka"),
            KeyValue::new("network.transport", "tcp"),
            KeyValue::new("messaging.system", "kafka"),
            KeyValue::new("messaging.destination.name", topic.to_string()),
            KeyValue::new("messaging.operation", "publish"),
        ])
        .start_with_context(&tracer, parent);
    parent.with_span(span)
}

fn end_producer_span(cx: &Context, status: &PublishStatus) {
    let span = cx.span();
    span.set_attribute(KeyValue::new(
        "messaging.kafka.producer.success",
        status.success(),
    ));
    span.set_attribute(KeyValue::new(
        "messaging.kafka.producer.duration_ms",
        status.latency.as_millis() as i64,
    ));
    if let Some(position) = status.position() {
        span.set_attribute(KeyValue::new(
            "messaging.kafka.destination.partition",
            i64::from(position.partition),
        ));
        span.set_attribute(KeyValue::new("messaging.kafka.message.offset", position.offset));
    }
    if let Some(cause) = status.cause() {
        span.set_status(Status::error(cause.to_string()));
    }
    span.end();
}

fn record(status: &PublishStatus) {
    let outcome = status.outcome_label();
    metrics::counter!("event_bus_publish_total", "outcome" => outcome).increment(1);
    metrics::histogram!("event_bus_publish_latency_seconds").record(status.latency.as_secs_f64());

    let duration_ms = status.latency.as_millis() as u64;
    match &status.outcome {
        PublishOutcome::Delivered(position) => tracing::info!(
            partition = position.partition,
            offset = position.offset,
            duration_ms,
            "order event written"
        ),
        PublishOutcome::Failed(e) => tracing::error!(
            error = %e,
            duration_ms,
            "failed to write order event"
        ),
        PublishOutcome::Cancelled { reason, enqueued } => tracing::warn!(
            reason = %reason,
            enqueued,
            duration_ms,
            "context ended before order event was acknowledged"
        ),
    }
}
