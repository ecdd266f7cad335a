//! Order confirmation email trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{History, OrderId};
use domain::OrderResult;

use crate::error::ServiceError;

/// Trait for order confirmation notifications.
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_order_confirmation(&self, email: &str, order: &OrderResult) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryEmailState {
    sent: History<(String, OrderId)>,
    fail_on_send: bool,
    delay: Option<Duration>,
}

/// In-memory email service recording the latest
/// [`common::DEFAULT_RETENTION`] confirmations.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmailService {
    state: Arc<RwLock<InMemoryEmailState>>,
}

impl InMemoryEmailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the latest `retention` confirmations.
    pub fn retaining(self, retention: usize) -> Self {
        self.write().sent = History::new(retention);
        self
    }

    /// Configures every send to fail.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.write().fail_on_send = fail;
    }

    /// Delays each send, to simulate a slow mail relay.
    pub fn set_delay(&self, delay: Duration) {
        self.write().delay = Some(delay);
    }

    /// Confirmations sent, retained or not.
    pub fn sent_count(&self) -> usize {
        self.read().sent.total()
    }

    /// Recipients and order ids of retained confirmations, in send order.
    pub fn sent(&self) -> Vec<(String, OrderId)> {
        self.read().sent.iter().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryEmailState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryEmailState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EmailService for InMemoryEmailService {
    async fn send_order_confirmation(&self, email: &str, order: &OrderResult) -> Result<(), ServiceError> {
        if email.trim().is_empty() {
            return Err(ServiceError::InvalidArgument("empty recipient".to_string()));
        }

        let delay = self.read().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.write();
        if state.fail_on_send {
            return Err(ServiceError::Unavailable("mail relay unreachable".to_string()));
        }
        state.sent.push((email.to_string(), order.order_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Address, Money};

    fn order() -> OrderResult {
        OrderResult {
            order_id: OrderId::new(),
            shipping_tracking_id: "TRACK-0001".to_string(),
            shipping_cost: Money::zero("USD"),
            shipping_address: Address::default(),
            items: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_records_confirmation() {
        let service = InMemoryEmailService::new();
        let order = order();
        service
            .send_order_confirmation("someone@example.com", &order)
            .await
            .unwrap();
        assert_eq!(
            service.sent(),
            vec![("someone@example.com".to_string(), order.order_id)]
        );
    }

    #[tokio::test]
    async fn test_retention_caps_recorded_confirmations() {
        let service = InMemoryEmailService::new().retaining(2);
        let orders: Vec<_> = (0..4).map(|_| order()).collect();
        for order in &orders {
            service
                .send_order_confirmation("someone@example.com", order)
                .await
                .unwrap();
        }

        assert_eq!(service.sent_count(), 4);
        let kept: Vec<_> = service.sent().into_iter().map(|(_, id)| id).collect();
        assert_eq!(kept, vec![orders[2].order_id, orders[3].order_id]);
    }

    #[tokio::test]
    async fn test_rejects_empty_recipient() {
        let service = InMemoryEmailService::new();
        assert!(matches!(
            service.send_order_confirmation(" ", &order()).await,
            Err(ServiceError::InvalidArgument(_))
        ));
        assert_eq!(service.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_on_send() {
        let service = InMemoryEmailService::new();
        service.set_fail_on_send(true);
        assert!(service
            .send_order_confirmation("someone@example.com", &order())
            .await
            .is_err());
    }
}
