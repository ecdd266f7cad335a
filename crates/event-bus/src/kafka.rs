//! Kafka-backed broker.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use crate::broker::{Broker, DeliveryPosition};
use crate::envelope::PublishEnvelope;
use crate::error::{PublishError, Result};

/// Delivers records to a Kafka cluster through a [`FutureProducer`].
pub struct KafkaBroker {
    producer: FutureProducer,
    queue_timeout: Duration,
}

impl KafkaBroker {
    /// Connects to the comma-separated bootstrap `brokers`.
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| PublishError::Broker(e.to_string()))?;

        Ok(Self {
            producer,
            queue_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    async fn deliver(&self, envelope: &PublishEnvelope) -> Result<DeliveryPosition> {
        let headers = envelope
            .headers
            .iter()
            .fold(OwnedHeaders::new(), |headers, (key, value)| {
                headers.insert(Header {
                    key,
                    value: Some(value.as_str()),
                })
            });

        let mut record = FutureRecord::<str, [u8]>::to(&envelope.topic)
            .payload(envelope.payload.as_slice())
            .headers(headers);
        if let Some(key) = &envelope.key {
            record = record.key(key.as_str());
        }

        match self
            .producer
            .send(record, Timeout::After(self.queue_timeout))
            .await
        {
            Ok((partition, offset)) => Ok(DeliveryPosition { partition, offset }),
            Err((e, _message)) => Err(PublishError::Broker(e.to_string())),
        }
    }
}
