//! Checkout orchestration.
//!
//! A [`CheckoutOrchestrator`] places one order per call by running its
//! stages in a fixed order:
//! 1. Generate the order id
//! 2. Prepare items: cart, catalog prices, currency conversion, shipping quote
//! 3. Compute the total
//! 4. Charge the card
//! 5. Book the shipment
//! 6. Empty the cart (best-effort)
//! 7. Assemble the order result
//! 8. Send the confirmation email (best-effort)
//! 9. Publish the order event (best-effort, when configured)
//!
//! Collaborators are reached through the traits in [`services`], bundled
//! in [`Collaborators`].

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod services;
pub mod stage;

pub use config::CheckoutConfig;
pub use error::{BestEffortFailure, CheckoutError, ErrorClass, ServiceError};
pub use orchestrator::{CheckoutOrchestrator, PlaceOrderRequest, PlacedOrder};
pub use services::{
    CartService, CatalogService, Collaborators, CurrencyService, EmailService,
    InMemoryCartService, InMemoryCatalogService, InMemoryCurrencyService, InMemoryEmailService,
    InMemoryPaymentService, InMemoryShippingService, OrderIdSource, PaymentService, Product,
    RandomOrderIds, Shipment, ShippingService, UnreachablePaymentService,
};
pub use stage::CheckoutStage;
