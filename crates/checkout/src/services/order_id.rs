//! Order id generation.

use common::OrderId;

use crate::error::ServiceError;

/// Source of fresh order ids.
pub trait OrderIdSource: Send + Sync {
    fn next_order_id(&self) -> Result<OrderId, ServiceError>;
}

/// Random (v4) UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOrderIds;

impl OrderIdSource for RandomOrderIds {
    fn next_order_id(&self) -> Result<OrderId, ServiceError> {
        let id = OrderId::new();
        if id.is_nil() {
            return Err(ServiceError::Unavailable("random source returned nil uuid".to_string()));
        }
        Ok(id)
    }
}
