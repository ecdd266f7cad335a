//! Domain layer for the checkout service.
//!
//! - [`Money`]: currency-tagged fixed-point amounts with checked arithmetic
//! - Order value objects: cart items, priced order items, the transient
//!   order preparation and the immutable order result

pub mod money;
pub mod order;

pub use money::{Money, MoneyError, NANOS_PER_UNIT};
pub use order::{Address, CartItem, CreditCardInfo, OrderItem, OrderPreparation, OrderResult};
