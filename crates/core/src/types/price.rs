//! Prices and conversion to payment-provider minor units.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting a price to minor currency units.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceError {
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    #[error("price {0} is out of range for minor-unit conversion")]
    OutOfRange(Decimal),
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Convert to the integer amount the payment provider expects.
    ///
    /// Two-decimal currencies are multiplied by 100 and rounded half away from
    /// zero, so `19.995` becomes `2000`. Zero-decimal currencies (JPY, KRW)
    /// are rounded to whole units.
    ///
    /// ```
    /// use openme_core::{CurrencyCode, Price};
    /// use rust_decimal::Decimal;
    ///
    /// let price = Price::new(Decimal::new(19_995, 3), CurrencyCode::USD);
    /// assert_eq!(price.to_minor_units(), Ok(2000));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative amounts and
    /// [`PriceError::OutOfRange`] when the result does not fit in `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }

        let factor = Decimal::from(10_i64.pow(self.currency_code.minor_unit_exponent()));
        self.amount
            .checked_mul(factor)
            .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|rounded| rounded.to_i64())
            .ok_or(PriceError::OutOfRange(self.amount))
    }

    /// Build a price back from provider minor units.
    #[must_use]
    pub fn from_minor_units(units: i64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::new(units, currency_code.minor_unit_exponent()),
            currency_code,
        }
    }
}

/// ISO 4217 currency codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
    CNY,
    JPY,
    KRW,
}

impl CurrencyCode {
    /// Number of decimal places in the currency's minor unit.
    #[must_use]
    pub const fn minor_unit_exponent(self) -> u32 {
        match self {
            Self::JPY | Self::KRW => 0,
            _ => 2,
        }
    }

    /// Upper-case ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
            Self::CNY => "CNY",
            Self::JPY => "JPY",
            Self::KRW => "KRW",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            "CNY" => Ok(Self::CNY),
            "JPY" => Ok(Self::JPY),
            "KRW" => Ok(Self::KRW),
            other => Err(PriceError::UnsupportedCurrency(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(units: i64, scale: u32) -> Price {
        Price::new(Decimal::new(units, scale), CurrencyCode::USD)
    }

    #[test]
    fn test_minor_units_exact() {
        assert_eq!(usd(2500, 2).to_minor_units(), Ok(2500));
        assert_eq!(usd(25, 0).to_minor_units(), Ok(2500));
        assert_eq!(usd(999, 2).to_minor_units(), Ok(999));
    }

    #[test]
    fn test_minor_units_rounds_midpoint_up() {
        assert_eq!(usd(19_995, 3).to_minor_units(), Ok(2000));
        assert_eq!(usd(10_005, 3).to_minor_units(), Ok(1001));
    }

    #[test]
    fn test_minor_units_rounds_below_midpoint_down() {
        assert_eq!(usd(19_994, 3).to_minor_units(), Ok(1999));
    }

    #[test]
    fn test_minor_units_zero() {
        assert_eq!(usd(0, 2).to_minor_units(), Ok(0));
    }

    #[test]
    fn test_minor_units_negative_rejected() {
        assert!(matches!(
            usd(-100, 2).to_minor_units(),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_zero_decimal_currency() {
        let yen = Price::new(Decimal::new(12_345, 1), CurrencyCode::JPY);
        assert_eq!(yen.to_minor_units(), Ok(1235));
    }

    #[test]
    fn test_from_minor_units() {
        let price = Price::from_minor_units(5999, CurrencyCode::USD);
        assert_eq!(price.amount, Decimal::new(5999, 2));
    }

    #[test]
    fn test_currency_from_str_case_insensitive() {
        assert_eq!("usd".parse::<CurrencyCode>(), Ok(CurrencyCode::USD));
        assert!("xyz".parse::<CurrencyCode>().is_err());
    }
}
