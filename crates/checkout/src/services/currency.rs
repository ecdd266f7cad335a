//! Currency conversion trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, MoneyError, NANOS_PER_UNIT};

use crate::error::ServiceError;

/// Trait for converting amounts between currencies.
#[async_trait]
pub trait CurrencyService: Send + Sync {
    /// Converts `from` into `to_code`. Converting to the same currency
    /// returns the amount unchanged.
    async fn convert(&self, from: &Money, to_code: &str) -> Result<Money, ServiceError>;
}

/// Units of each currency worth one euro, in millionths.
const EUR_RATES: &[(&str, i64)] = &[
    ("EUR", 1_000_000),
    ("USD", 1_130_500),
    ("JPY", 126_400_000),
    ("BGN", 1_955_800),
    ("CZK", 25_592_000),
    ("DKK", 7_460_900),
    ("GBP", 859_700),
    ("HUF", 315_510_000),
    ("PLN", 4_299_600),
    ("RON", 4_746_300),
    ("SEK", 10_537_500),
    ("CHF", 1_136_000),
    ("ISK", 136_800_000),
    ("NOK", 9_804_000),
    ("HRK", 7_421_000),
    ("RUB", 74_420_800),
    ("TRY", 6_124_700),
    ("AUD", 1_607_200),
    ("BRL", 4_268_200),
    ("CAD", 1_512_800),
    ("CNY", 7_585_700),
    ("HKD", 8_874_300),
    ("IDR", 15_999_400_000),
    ("ILS", 4_087_500),
    ("INR", 79_432_000),
    ("KRW", 1_275_050_000),
    ("MXN", 21_799_900),
    ("MYR", 4_628_900),
    ("NZD", 1_667_900),
    ("PHP", 59_083_000),
    ("SGD", 1_534_900),
    ("THB", 36_012_000),
    ("ZAR", 16_058_300),
];

#[derive(Debug)]
struct InMemoryCurrencyState {
    rates: HashMap<String, i64>,
    conversions: usize,
    fail_on_convert: bool,
}

/// Converts through a fixed euro-based rate table.
#[derive(Debug, Clone)]
pub struct InMemoryCurrencyService {
    state: Arc<RwLock<InMemoryCurrencyState>>,
}

impl Default for InMemoryCurrencyService {
    fn default() -> Self {
        let rates = EUR_RATES
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        Self {
            state: Arc::new(RwLock::new(InMemoryCurrencyState {
                rates,
                conversions: 0,
                fail_on_convert: false,
            })),
        }
    }
}

impl InMemoryCurrencyService {
    /// Creates a service seeded with the euro rate table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many millionths of `code` one euro buys.
    pub fn set_rate(&self, code: impl Into<String>, micros_per_eur: i64) {
        self.write().rates.insert(code.into(), micros_per_eur);
    }

    /// Configures every conversion to fail.
    pub fn set_fail_on_convert(&self, fail: bool) {
        self.write().fail_on_convert = fail;
    }

    /// Returns true if `code` has a rate.
    pub fn supports(&self, code: &str) -> bool {
        self.read().rates.contains_key(code)
    }

    /// Number of convert calls received.
    pub fn conversion_count(&self) -> usize {
        self.read().conversions
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryCurrencyState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryCurrencyState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CurrencyService for InMemoryCurrencyService {
    async fn convert(&self, from: &Money, to_code: &str) -> Result<Money, ServiceError> {
        let mut state = self.write();
        state.conversions += 1;
        if state.fail_on_convert {
            return Err(ServiceError::Unavailable("currency service unreachable".to_string()));
        }

        let rate = |code: &str| {
            state
                .rates
                .get(code)
                .copied()
                .filter(|rate| *rate > 0)
                .ok_or_else(|| ServiceError::InvalidArgument(format!("unsupported currency {code}")))
        };
        let from_rate = rate(from.currency_code())?;
        let to_rate = rate(to_code)?;

        if from.currency_code() == to_code {
            return Ok(from.clone());
        }
        Ok(rescale(from, to_code, from_rate, to_rate)?)
    }
}

/// Multiplies `amount` by `to_rate / from_rate`, truncating toward zero.
fn rescale(amount: &Money, to_code: &str, from_rate: i64, to_rate: i64) -> Result<Money, MoneyError> {
    let scale = i128::from(NANOS_PER_UNIT);
    let nanos = i128::from(amount.units()) * scale + i128::from(amount.nanos());
    let converted = nanos * i128::from(to_rate) / i128::from(from_rate);

    let overflow = || MoneyError::Overflow {
        currency: to_code.to_string(),
    };
    let units = i64::try_from(converted / scale).map_err(|_| overflow())?;
    let nanos = i32::try_from(converted % scale).map_err(|_| overflow())?;
    Money::new(to_code, units, nanos)
}
