//! Publication error types.

use common::CancelReason;
use thiserror::Error;

/// Errors raised while publishing an order event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// The order could not be serialized into a record payload.
    #[error("failed to serialize order event: {0}")]
    Serialization(String),

    /// The broker rejected or failed to deliver the record.
    #[error("broker error: {0}")]
    Broker(String),

    /// The producer input pathway is closed (runtime shut down).
    #[error("producer is closed")]
    Closed,

    /// The producer dropped the record without acknowledging it.
    #[error("record dropped before acknowledgement")]
    Dropped,

    /// The request context ended while publishing.
    #[error("publish interrupted: {0}")]
    Interrupted(CancelReason),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::Serialization(err.to_string())
    }
}

/// Convenience type alias for publication results.
pub type Result<T> = std::result::Result<T, PublishError>;
