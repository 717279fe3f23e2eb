//! Backend money amounts with decimal arithmetic.
//!
//! The commerce backend reports money as an integer amount in the currency's
//! smallest unit plus the number of fraction digits (`centAmount: 1999,
//! fractionDigits: 2` is 19.99). The storefront schema wants a decimal
//! `value` and a `currency` code.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Fraction digits assumed when the backend omits them.
pub const DEFAULT_FRACTION_DIGITS: u32 = 2;

/// Errors that can occur when converting a [`Money`] amount.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The fraction digits exceed what a decimal can represent.
    #[error("unsupported fraction digits: {0}")]
    UnsupportedScale(u32),
}

/// A money amount as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    /// Amount in the smallest currency unit.
    pub cent_amount: i64,
    /// ISO 4217 currency code.
    pub currency_code: String,
    /// Number of digits after the decimal point.
    #[serde(default = "default_fraction_digits")]
    pub fraction_digits: u32,
}

const fn default_fraction_digits() -> u32 {
    DEFAULT_FRACTION_DIGITS
}

impl Money {
    /// Create an amount in the smallest currency unit with two fraction digits.
    #[must_use]
    pub fn from_cents(cent_amount: i64, currency_code: impl Into<String>) -> Self {
        Self {
            cent_amount,
            currency_code: currency_code.into(),
            fraction_digits: DEFAULT_FRACTION_DIGITS,
        }
    }

    /// The decimal amount in the currency's standard unit.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::UnsupportedScale`] if `fraction_digits` is larger
    /// than a decimal can hold.
    pub fn amount(&self) -> Result<Decimal, MoneyError> {
        Decimal::try_new(self.cent_amount, self.fraction_digits)
            .map_err(|_| MoneyError::UnsupportedScale(self.fraction_digits))
    }

    /// The amount as a float, for GraphQL `Float` fields.
    ///
    /// Falls back to `0.0` when the scale is unsupported.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.amount()
            .ok()
            .and_then(|amount| amount.to_f64())
            .unwrap_or_default()
    }
}
