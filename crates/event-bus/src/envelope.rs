//! The record handed to the producer for each publish attempt.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::trace;
use domain::OrderResult;
use opentelemetry::Context;
use opentelemetry::trace::SpanContext;

use crate::error::Result;

/// Topic completed orders are published to.
pub const ORDERS_TOPIC: &str = "orders";

/// One message-bus record: topic, key, payload and propagation headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEnvelope {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub headers: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl PublishEnvelope {
    /// Builds the record for a placed order.
    ///
    /// The payload is the JSON-serialized order, keyed by order id. The span
    /// active in `cx` is injected into the headers.
    pub fn for_order(topic: &str, order: &OrderResult, cx: &Context) -> Result<Self> {
        let payload = serde_json::to_vec(order)?;
        let mut headers = BTreeMap::new();
        trace::inject(cx, &mut headers);

        Ok(Self {
            topic: topic.to_string(),
            key: Some(order.order_id.to_string()),
            payload,
            headers,
            created_at: Utc::now(),
        })
    }

    /// Deserializes the payload back into the order it was built from.
    pub fn order(&self) -> Result<OrderResult> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// The span the record was published under, if the headers carry one.
    pub fn trace(&self) -> Option<SpanContext> {
        trace::span_context(&trace::extract(&self.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;
    use domain::{Address, CartItem, Money, OrderItem};
    use opentelemetry::trace::{SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};

    fn order() -> OrderResult {
        OrderResult {
            order_id: OrderId::new(),
            shipping_tracking_id: "TRACK-0001".to_string(),
            shipping_cost: Money::from_units("USD", 5),
            shipping_address: Address::default(),
            items: vec![OrderItem::new(CartItem::new("A", 2), Money::from_units("USD", 10))],
        }
    }

    #[test]
    fn test_envelope_carries_order_and_trace() {
        let order = order();
        let span = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            false,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span.clone());
        let envelope = PublishEnvelope::for_order(ORDERS_TOPIC, &order, &cx).unwrap();

        assert_eq!(envelope.topic, "orders");
        assert_eq!(envelope.key.as_deref(), Some(order.order_id.to_string().as_str()));
        assert_eq!(envelope.order().unwrap(), order);
        assert_eq!(
            envelope.headers["traceparent"],
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );

        let carried = envelope.trace().unwrap();
        assert_eq!(carried.trace_id(), span.trace_id());
        assert_eq!(carried.span_id(), span.span_id());
    }

    #[test]
    fn test_envelope_without_span_has_no_trace() {
        let envelope = PublishEnvelope::for_order(ORDERS_TOPIC, &order(), &Context::new()).unwrap();
        assert!(envelope.headers.is_empty());
        assert!(envelope.trace().is_none());
    }
}
