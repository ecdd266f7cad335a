//! Order value objects exchanged with collaborators and published on the bus.

use common::{OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::money::{Money, MoneyError};

/// A product and quantity held in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A cart item priced in the requesting user's currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item: CartItem,

    /// Price of a single unit, already converted to the user's currency.
    pub cost: Money,
}

impl OrderItem {
    pub fn new(item: CartItem, cost: Money) -> Self {
        Self { item, cost }
    }

    /// Unit cost multiplied by the quantity.
    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.cost.multiply_slow(self.item.quantity)
    }
}

/// Shipping destination. Forwarded to collaborators without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street_address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
}

/// Card details forwarded to the payment collaborator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCardInfo {
    pub credit_card_number: String,
    pub credit_card_cvv: u32,
    pub credit_card_expiration_year: i32,
    pub credit_card_expiration_month: u32,
}

impl CreditCardInfo {
    /// Last four digits, the only part of the number that may be logged.
    pub fn last_four(&self) -> &str {
        let digits = self.credit_card_number.trim();
        let start = digits.len().saturating_sub(4);
        digits.get(start..).unwrap_or("")
    }
}

impl std::fmt::Debug for CreditCardInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditCardInfo")
            .field("credit_card_number", &format_args!("****{}", self.last_four()))
            .field("credit_card_cvv", &"***")
            .field("credit_card_expiration_year", &self.credit_card_expiration_year)
            .field("credit_card_expiration_month", &self.credit_card_expiration_month)
            .finish()
    }
}

/// Data gathered while preparing an order, before anything is charged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPreparation {
    pub order_items: Vec<OrderItem>,
    pub cart_items: Vec<CartItem>,
    pub shipping_cost_localized: Money,
}

impl OrderPreparation {
    /// Shipping plus every line total, in `currency_code`.
    ///
    /// All amounts were converted to the user's currency beforehand, so any
    /// error here means a collaborator broke that contract.
    pub fn total(&self, currency_code: &str) -> Result<Money, MoneyError> {
        let mut total = Money::zero(currency_code).sum(&self.shipping_cost_localized)?;
        for item in &self.order_items {
            total = total.sum(&item.line_total()?)?;
        }
        Ok(total)
    }

    /// Number of units across all cart lines.
    pub fn unit_count(&self) -> u64 {
        self.cart_items.iter().map(|i| u64::from(i.quantity)).sum()
    }
}

/// The outcome of a successful checkout.
///
/// Returned to the caller and published as the `orders` event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: OrderId,
    pub shipping_tracking_id: String,
    pub shipping_cost: Money,
    pub shipping_address: Address,
    pub items: Vec<OrderItem>,
}
