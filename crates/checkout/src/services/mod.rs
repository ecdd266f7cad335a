//! Collaborator service traits and in-memory implementations.

pub mod cart;
pub mod catalog;
pub mod currency;
pub mod email;
pub mod order_id;
pub mod payment;
pub mod shipping;

use std::sync::Arc;

pub use cart::{CartService, InMemoryCartService};
pub use catalog::{CatalogService, InMemoryCatalogService, Product};
pub use currency::{CurrencyService, InMemoryCurrencyService};
pub use email::{EmailService, InMemoryEmailService};
pub use order_id::{OrderIdSource, RandomOrderIds};
pub use payment::{
    CardType, InMemoryPaymentService, PaymentService, UNREACHABLE_PAYMENT_ADDRESS,
    UnreachablePaymentService, validate_card,
};
pub use shipping::{InMemoryShippingService, Shipment, ShippingService};

/// Every collaborator the orchestrator calls.
#[derive(Clone)]
pub struct Collaborators {
    pub cart: Arc<dyn CartService>,
    pub catalog: Arc<dyn CatalogService>,
    pub currency: Arc<dyn CurrencyService>,
    pub shipping: Arc<dyn ShippingService>,
    pub payment: Arc<dyn PaymentService>,
    pub email: Arc<dyn EmailService>,
    pub order_ids: Arc<dyn OrderIdSource>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
