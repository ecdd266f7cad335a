//! Publication of completed orders onto the message bus.
//!
//! The [`EventPublisher`] serializes an [`domain::OrderResult`], injects the
//! caller's trace context into the record headers, hands the record to the
//! shared producer and waits, bounded by the request context, for the first
//! of: delivery acknowledgement, error acknowledgement, or cancellation.
//!
//! The [`ProducerRuntime`] owns the two process-wide tasks: the dispatcher
//! feeding the [`Broker`], and the background drain that logs every delivery
//! error. It is started once before serving and shut down once at exit.

pub mod broker;
pub mod envelope;
pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;
pub mod overload;
pub mod producer;
pub mod publisher;

pub use broker::{Broker, DeliveryPosition};
pub use envelope::{ORDERS_TOPIC, PublishEnvelope};
pub use error::PublishError;
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::InMemoryBroker;
pub use producer::{MAX_IN_FLIGHT, PendingAck, ProducerHandle, ProducerRuntime};
pub use publisher::{EventPublisher, PublishOutcome, PublishReport, PublishStatus};
