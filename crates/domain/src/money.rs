//! Currency-tagged fixed-point amounts.
//!
//! A [`Money`] value is a whole number of `units` plus a fractional part in
//! `nanos` (billionths of a unit). A value is *valid* when
//! `|nanos| < 1_000_000_000` and the signs of `units` and `nanos` agree
//! (either may be zero). Every operation returns a new, valid value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of nanos in one whole unit.
pub const NANOS_PER_UNIT: i32 = 1_000_000_000;

const NANOS_MIN: i32 = -999_999_999;
const NANOS_MAX: i32 = 999_999_999;

/// Errors produced by money arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The operands are tagged with different currencies.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    /// An operand violates the nanos range or sign agreement.
    #[error("invalid money value: {0}")]
    InvalidValue(String),

    /// The result does not fit in the units range.
    #[error("money amount overflows the {currency} units range")]
    Overflow { currency: String },
}

impl MoneyError {
    /// Only a currency mismatch can be fixed by the caller (by converting first).
    /// Everything else is a programming error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MoneyError::CurrencyMismatch { .. })
    }
}

/// A currency-tagged amount of whole units and nanos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    currency_code: String,
    units: i64,
    nanos: i32,
}

impl Money {
    /// Creates a validated amount.
    pub fn new(currency_code: impl Into<String>, units: i64, nanos: i32) -> Result<Self, MoneyError> {
        let money = Self {
            currency_code: currency_code.into(),
            units,
            nanos,
        };
        if !money.is_valid() {
            return Err(MoneyError::InvalidValue(money.describe()));
        }
        Ok(money)
    }

    /// Zero in the given currency.
    pub fn zero(currency_code: impl Into<String>) -> Self {
        Self {
            currency_code: currency_code.into(),
            units: 0,
            nanos: 0,
        }
    }

    /// A whole number of units with no fractional part.
    pub fn from_units(currency_code: impl Into<String>, units: i64) -> Self {
        Self {
            currency_code: currency_code.into(),
            units,
            nanos: 0,
        }
    }

    pub fn currency_code(&self) -> &str {
        &self.currency_code
    }

    pub fn units(&self) -> i64 {
        self.units
    }

    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    /// Returns true if nanos are in range and agree in sign with units.
    pub fn is_valid(&self) -> bool {
        let nanos_in_range = (NANOS_MIN..=NANOS_MAX).contains(&self.nanos);
        let signs_agree = self.nanos == 0
            || self.units == 0
            || (self.nanos < 0) == (self.units < 0);
        nanos_in_range && signs_agree
    }

    pub fn is_zero(&self) -> bool {
        self.units == 0 && self.nanos == 0
    }

    pub fn is_negative(&self) -> bool {
        self.units < 0 || (self.units == 0 && self.nanos < 0)
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency_code == other.currency_code
    }

    /// Adds two amounts of the same currency.
    ///
    /// Nanos are added and any whole units carried (truncating toward zero);
    /// if units and nanos then disagree in sign, one unit is borrowed so the
    /// result is valid again. Overflow of the units range is an error.
    pub fn sum(&self, other: &Money) -> Result<Money, MoneyError> {
        if !self.is_valid() {
            return Err(MoneyError::InvalidValue(self.describe()));
        }
        if !other.is_valid() {
            return Err(MoneyError::InvalidValue(other.describe()));
        }
        if !self.same_currency(other) {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency_code.clone(),
                right: other.currency_code.clone(),
            });
        }

        let overflow = || MoneyError::Overflow {
            currency: self.currency_code.clone(),
        };

        // Both nanos are in range, so their sum fits comfortably in i64.
        let nanos = i64::from(self.nanos) + i64::from(other.nanos);
        let mut units = self
            .units
            .checked_add(other.units)
            .and_then(|u| u.checked_add(nanos / i64::from(NANOS_PER_UNIT)))
            .ok_or_else(overflow)?;
        let mut nanos = nanos % i64::from(NANOS_PER_UNIT);

        if units > 0 && nanos < 0 {
            units -= 1;
            nanos += i64::from(NANOS_PER_UNIT);
        } else if units < 0 && nanos > 0 {
            units += 1;
            nanos -= i64::from(NANOS_PER_UNIT);
        }

        Ok(Money {
            currency_code: self.currency_code.clone(),
            units,
            // |nanos| < NANOS_PER_UNIT after the remainder above.
            nanos: nanos as i32,
        })
    }

    /// Multiplies an amount by a non-negative count.
    ///
    /// The result is identical to folding [`Money::sum`] over `n` copies of
    /// `self`, starting from zero. Because every valid amount has exactly one
    /// valid representation and the partial sums grow monotonically in
    /// magnitude, the product is computed directly in 128-bit nanos instead
    /// of looping; it overflows exactly when some partial sum would.
    pub fn multiply_slow(&self, n: u32) -> Result<Money, MoneyError> {
        if !self.is_valid() {
            return Err(MoneyError::InvalidValue(self.describe()));
        }

        let per_unit = i128::from(NANOS_PER_UNIT);
        let total = (i128::from(self.units) * per_unit + i128::from(self.nanos)) * i128::from(n);

        // Division truncates toward zero and the remainder takes the sign of
        // the dividend, so units and nanos always agree.
        let units = i64::try_from(total / per_unit).map_err(|_| MoneyError::Overflow {
            currency: self.currency_code.clone(),
        })?;
        let nanos = (total % per_unit) as i32;

        Ok(Money {
            currency_code: self.currency_code.clone(),
            units,
            nanos,
        })
    }

    /// Returns the amount with its sign flipped.
    pub fn negate(&self) -> Money {
        Money {
            currency_code: self.currency_code.clone(),
            units: -self.units,
            nanos: -self.nanos,
        }
    }

    /// Lossy floating point view, for log and span attributes only.
    pub fn as_f64(&self) -> f64 {
        self.units as f64 + f64::from(self.nanos) / f64::from(NANOS_PER_UNIT)
    }

    fn describe(&self) -> String {
        format!(
            "{} units={} nanos={}",
            self.currency_code, self.units, self.nanos
        )
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        write!(
            f,
            "{sign}{}.{:02} {}",
            self.units.unsigned_abs(),
            self.nanos.unsigned_abs() / 10_000_000,
            self.currency_code
        )
    }
}
