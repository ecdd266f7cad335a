//! The message bus seen by the producer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::envelope::PublishEnvelope;
use crate::error::Result;

/// Where the bus stored an acknowledged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryPosition {
    pub partition: i32,
    pub offset: i64,
}

impl std::fmt::Display for DeliveryPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

/// Delivers one record and reports where it landed.
///
/// The producer keeps several deliveries in flight, so implementations are
/// called concurrently.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn deliver(&self, envelope: &PublishEnvelope) -> Result<DeliveryPosition>;
}
