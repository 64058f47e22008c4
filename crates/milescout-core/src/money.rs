//! Currency-tagged monetary amounts.
//!
//! A [`Money`] binds a decimal amount to an ISO-4217-style currency code.
//! Arithmetic and comparison only succeed between amounts of the same
//! currency; there is no conversion between currencies.

use crate::error::MoneyError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Currency code such as `USD`.
///
/// Codes are stored upper-cased so `usd` and `USD` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// US dollars, the currency the airline prices domestic fares in.
    pub const USD: &'static str = "USD";

    /// Create a currency code, normalising to upper case.
    #[must_use]
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new(Self::USD)
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for CurrencyCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

/// A priced amount in a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount
    pub amount: Decimal,
    /// Currency the amount is expressed in
    pub currency: CurrencyCode,
}

impl Money {
    /// Create a new amount.
    #[must_use]
    pub fn new(amount: Decimal, currency: impl Into<CurrencyCode>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub fn zero(currency: impl Into<CurrencyCode>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Fail with [`MoneyError::CurrencyMismatch`] unless both amounts share a currency.
    pub fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch {
                left: self.currency.to_string(),
                right: other.currency.to_string(),
            })
        }
    }

    /// Subtract `other` from this amount.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(Money::new(self.amount - other.amount, self.currency.clone()))
    }

    /// Compare two amounts, failing when the currencies differ.
    pub fn try_cmp(&self, other: &Money) -> Result<Ordering, MoneyError> {
        self.ensure_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Read the amount, asserting it is held in `expected`.
    ///
    /// Returns [`MoneyError::UnsupportedConversion`] for any other currency.
    pub fn amount_in(&self, expected: &CurrencyCode) -> Result<Decimal, MoneyError> {
        if &self.currency == expected {
            Ok(self.amount)
        } else {
            Err(MoneyError::UnsupportedConversion {
                from: self.currency.to_string(),
                to: expected.to_string(),
            })
        }
    }
}

/// Amounts in different currencies are unordered.
impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(amount: i64) -> Money {
        Money::new(Decimal::from(amount), "USD")
    }

    fn eur(amount: i64) -> Money {
        Money::new(Decimal::from(amount), "EUR")
    }

    #[test]
    fn test_currency_code_normalised() {
        assert_eq!(CurrencyCode::new(" usd "), CurrencyCode::new("USD"));
        assert_eq!(CurrencyCode::default().as_str(), "USD");
    }

    #[test]
    fn test_same_currency_subtraction() {
        let diff = usd(100).checked_sub(&usd(20)).expect("same currency");
        assert_eq!(diff, usd(80));
    }

    #[test]
    fn test_mismatched_currency_fails() {
        let err = usd(10).checked_sub(&eur(10)).unwrap_err();
        assert_eq!(
            err,
            MoneyError::CurrencyMismatch {
                left: "USD".to_string(),
                right: "EUR".to_string(),
            }
        );
        assert!(usd(10).ensure_same_currency(&eur(10)).is_err());
        assert!(usd(10).try_cmp(&eur(10)).is_err());
    }

    #[test]
    fn test_ordering_within_currency() {
        assert!(usd(5) < usd(10));
        assert_eq!(usd(10).try_cmp(&usd(10)), Ok(Ordering::Equal));
    }

    #[test]
    fn test_cross_currency_is_unordered() {
        assert_eq!(usd(10).partial_cmp(&eur(10)), None);
        assert_ne!(usd(10), eur(10));
    }

    #[test]
    fn test_amount_in_expected_currency() {
        let usd_code = CurrencyCode::new("USD");
        assert_eq!(usd(42).amount_in(&usd_code), Ok(Decimal::from(42)));

        let err = eur(42).amount_in(&usd_code).unwrap_err();
        assert!(matches!(err, MoneyError::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_deserialize_payload_amount() {
        let money: Money = serde_json::from_str(r#"{"amount": 59.5, "currency": "USD"}"#)
            .expect("deserialize money");
        assert_eq!(money.amount, Decimal::new(595, 1));
        assert_eq!(money.currency.as_str(), "USD");
        assert_eq!(money.to_string(), "59.5 USD");
    }
}
