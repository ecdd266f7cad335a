//! Shipping service trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::History;
use domain::{Address, CartItem, Money};

use crate::error::ServiceError;

/// Trait for shipping quotes and bookings.
#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Quotes the cost of shipping `items` to `address`, in USD.
    async fn get_quote(&self, address: &Address, items: &[CartItem]) -> Result<Money, ServiceError>;

    /// Books the shipment and returns its tracking id.
    async fn ship_order(&self, address: &Address, items: &[CartItem]) -> Result<String, ServiceError>;
}

/// A booked shipment, as the carrier recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    pub tracking_id: String,
    pub address: Address,
    pub items: Vec<CartItem>,
}

#[derive(Debug)]
struct InMemoryShippingState {
    rate_per_item: Money,
    shipments: History<Shipment>,
    next_id: u32,
    fail_on_quote: bool,
    fail_on_ship: bool,
    ship_delay: Option<Duration>,
}

/// In-memory shipping service for testing.
///
/// Quotes a flat USD rate per unit shipped and keeps the latest
/// [`common::DEFAULT_RETENTION`] shipments.
#[derive(Debug, Clone)]
pub struct InMemoryShippingService {
    state: Arc<RwLock<InMemoryShippingState>>,
}

impl Default for InMemoryShippingService {
    fn default() -> Self {
        Self::with_rate(Money::from_units("USD", 5))
    }
}

impl InMemoryShippingService {
    /// Creates a service quoting 5.00 USD per unit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service quoting `rate_per_item` for each unit.
    pub fn with_rate(rate_per_item: Money) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryShippingState {
                rate_per_item,
                shipments: History::default(),
                next_id: 0,
                fail_on_quote: false,
                fail_on_ship: false,
                ship_delay: None,
            })),
        }
    }

    /// Keeps only the latest `retention` shipments.
    pub fn retaining(self, retention: usize) -> Self {
        self.write().shipments = History::new(retention);
        self
    }

    /// Configures get_quote calls to fail.
    pub fn set_fail_on_quote(&self, fail: bool) {
        self.write().fail_on_quote = fail;
    }

    /// Configures ship_order calls to fail.
    pub fn set_fail_on_ship(&self, fail: bool) {
        self.write().fail_on_ship = fail;
    }

    /// Delays each ship_order call, to simulate a slow carrier.
    pub fn set_ship_delay(&self, delay: Duration) {
        self.write().ship_delay = Some(delay);
    }

    /// Returns the number of shipments booked, retained or not.
    pub fn shipment_count(&self) -> usize {
        self.read().shipments.total()
    }

    /// Returns the retained shipment with the given tracking id.
    pub fn shipment(&self, tracking_id: &str) -> Option<Shipment> {
        self.read()
            .shipments
            .iter()
            .rev()
            .find(|s| s.tracking_id == tracking_id)
            .cloned()
    }

    /// Returns true if a retained shipment has the given tracking id.
    pub fn has_shipment(&self, tracking_id: &str) -> bool {
        self.shipment(tracking_id).is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryShippingState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryShippingState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ShippingService for InMemoryShippingService {
    async fn get_quote(&self, _address: &Address, items: &[CartItem]) -> Result<Money, ServiceError> {
        let state = self.read();
        if state.fail_on_quote {
            return Err(ServiceError::Unavailable("quote service unreachable".to_string()));
        }

        let count = items
            .iter()
            .try_fold(0u32, |count, item| count.checked_add(item.quantity))
            .ok_or_else(|| ServiceError::InvalidArgument("too many units to ship".to_string()))?;
        Ok(state.rate_per_item.multiply_slow(count)?)
    }

    async fn ship_order(&self, address: &Address, items: &[CartItem]) -> Result<String, ServiceError> {
        let delay = self.read().ship_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.write();
        if state.fail_on_ship {
            return Err(ServiceError::Unavailable("shipping unavailable".to_string()));
        }

        state.next_id += 1;
        let tracking_id = format!("TRACK-{:04}", state.next_id);
        state.shipments.push(Shipment {
            tracking_id: tracking_id.clone(),
            address: address.clone(),
            items: items.to_vec(),
        });

        Ok(tracking_id)
    }
}
