//! Payment service trait and implementations.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use common::History;
use domain::{CreditCardInfo, Money};

use crate::error::ServiceError;

/// Destination the `paymentUnreachable` flag redirects charges to.
pub const UNREACHABLE_PAYMENT_ADDRESS: &str = "badAddress:50051";

/// Trait for payment processing.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges `amount` to the card and returns the transaction id.
    async fn charge(&self, amount: &Money, card: &CreditCardInfo) -> Result<String, ServiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Visa,
    Mastercard,
}

/// Validates a card the way the payment gateway does: Luhn checksum,
/// VISA or MasterCard only, and not expired in the current month.
pub fn validate_card(card: &CreditCardInfo) -> Result<CardType, ServiceError> {
    let number: String = card
        .credit_card_number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) || !luhn_valid(&number) {
        return Err(ServiceError::InvalidArgument(
            "credit card info is invalid".to_string(),
        ));
    }

    let card_type = card_type(&number).ok_or_else(|| {
        ServiceError::Rejected("only VISA or MasterCard is accepted".to_string())
    })?;

    let now = Utc::now();
    let current = i64::from(now.year()) * 12 + i64::from(now.month());
    let expires = i64::from(card.credit_card_expiration_year) * 12
        + i64::from(card.credit_card_expiration_month);
    if current > expires {
        return Err(ServiceError::Rejected(format!(
            "card ending {} expired on {}/{}",
            card.last_four(),
            card.credit_card_expiration_month,
            card.credit_card_expiration_year
        )));
    }

    Ok(card_type)
}

fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn card_type(digits: &str) -> Option<CardType> {
    let prefix = |n: usize| digits.get(..n).and_then(|p| p.parse::<u32>().ok());
    if digits.starts_with('4') && matches!(digits.len(), 13 | 16 | 19) {
        return Some(CardType::Visa);
    }
    if digits.len() == 16
        && (prefix(2).is_some_and(|p| (51..=55).contains(&p))
            || prefix(4).is_some_and(|p| (2221..=2720).contains(&p)))
    {
        return Some(CardType::Mastercard);
    }
    None
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    charges: History<(String, Money)>,
    next_id: u32,
    fail_on_charge: bool,
}

/// In-memory payment gateway for testing.
///
/// Keeps the latest [`common::DEFAULT_RETENTION`] charges.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps only the latest `retention` charges.
    pub fn retaining(self, retention: usize) -> Self {
        self.write().charges = History::new(retention);
        self
    }

    /// Configures every charge to be declined.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.write().fail_on_charge = fail;
    }

    /// Returns the number of successful charges, retained or not.
    pub fn charge_count(&self) -> usize {
        self.read().charges.total()
    }

    /// Returns the amount of a retained charge.
    pub fn charged(&self, transaction_id: &str) -> Option<Money> {
        self.read()
            .charges
            .iter()
            .rev()
            .find(|(id, _)| id == transaction_id)
            .map(|(_, amount)| amount.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPaymentState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPaymentState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(&self, amount: &Money, card: &CreditCardInfo) -> Result<String, ServiceError> {
        validate_card(card)?;

        let mut state = self.write();
        if state.fail_on_charge {
            return Err(ServiceError::Rejected("payment declined".to_string()));
        }

        state.next_id += 1;
        let transaction_id = format!("PAY-{:04}", state.next_id);
        state.charges.push((transaction_id.clone(), amount.clone()));

        tracing::debug!(
            transaction_id = %transaction_id,
            card = card.last_four(),
            amount = %amount,
            "card charged"
        );
        Ok(transaction_id)
    }
}

/// A payment client pointed at an address nothing listens on.
///
/// Every charge fails as unreachable.
#[derive(Debug, Clone)]
pub struct UnreachablePaymentService {
    address: String,
}

impl UnreachablePaymentService {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Default for UnreachablePaymentService {
    fn default() -> Self {
        Self::new(UNREACHABLE_PAYMENT_ADDRESS)
    }
}

#[async_trait]
impl PaymentService for UnreachablePaymentService {
    async fn charge(&self, _amount: &Money, _card: &CreditCardInfo) -> Result<String, ServiceError> {
        Err(ServiceError::Unavailable(format!(
            "name resolution failed for {}",
            self.address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, year: i32) -> CreditCardInfo {
        CreditCardInfo {
            credit_card_number: number.to_string(),
            credit_card_cvv: 672,
            credit_card_expiration_year: year,
            credit_card_expiration_month: 1,
        }
    }

    const VISA: &str = "4432-8015-6152-0454";
    const MASTERCARD: &str = "5555555555554444";

    #[test]
    fn test_accepts_visa_and_mastercard() {
        assert_eq!(validate_card(&card(VISA, 2099)).unwrap(), CardType::Visa);
        assert_eq!(validate_card(&card(MASTERCARD, 2099)).unwrap(), CardType::Mastercard);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let result = validate_card(&card("4432801561520455", 2099));
        assert!(matches!(result, Err(ServiceError::InvalidArgument(_))));
        assert!(validate_card(&card("", 2099)).is_err());
    }

    #[test]
    fn test_rejects_other_networks() {
        // A valid American Express test number.
        let result = validate_card(&card("378282246310005", 2099));
        assert!(matches!(result, Err(ServiceError::Rejected(_))));
    }

    #[test]
    fn test_rejects_expired_card() {
        let result = validate_card(&card(VISA, 2000));
        assert!(matches!(result, Err(ServiceError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_charge_records_transaction() {
        let service = InMemoryPaymentService::new();
        let amount = Money::from_units("USD", 25);

        let tx = service.charge(&amount, &card(VISA, 2099)).await.unwrap();
        assert_eq!(tx, "PAY-0001");
        assert_eq!(service.charge_count(), 1);
        assert_eq!(service.charged(&tx), Some(amount));
    }

    #[tokio::test]
    async fn test_retention_caps_recorded_charges() {
        let service = InMemoryPaymentService::new().retaining(1);
        let amount = Money::from_units("USD", 3);
        let first = service.charge(&amount, &card(VISA, 2099)).await.unwrap();
        let second = service.charge(&amount, &card(VISA, 2099)).await.unwrap();

        assert_eq!(service.charge_count(), 2);
        assert_eq!(service.charged(&first), None);
        assert_eq!(service.charged(&second), Some(amount));
    }

    #[tokio::test]
    async fn test_fail_on_charge() {
        let service = InMemoryPaymentService::new();
        service.set_fail_on_charge(true);
        let result = service.charge(&Money::from_units("USD", 1), &card(VISA, 2099)).await;
        assert!(result.is_err());
        assert_eq!(service.charge_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_always_fails() {
        let service = UnreachablePaymentService::default();
        assert_eq!(service.address(), "badAddress:50051");
        let result = service.charge(&Money::from_units("USD", 1), &card(VISA, 2099)).await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
    }
}
