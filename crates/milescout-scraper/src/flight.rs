//! Per-flight records derived from search responses.
//!
//! Each of the three searches produces one map keyed by [`FlightKey`]; the
//! merged [`FlightTimingAndPrices`] holds one record from each map.

use chrono::NaiveDateTime;
use milescout_core::{Money, MoneyError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation key: carrier code and flight number of every segment, joined with `_`.
///
/// Two responses describe the same flight only when their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightKey(String);

impl FlightKey {
    /// Build a key from per-segment flight designators, in segment order.
    pub fn from_designators<I, S>(designators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<String> = designators
            .into_iter()
            .map(|d| d.as_ref().to_string())
            .collect();
        Self(parts.join("_"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FlightKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Departure and arrival wall-clock times at the respective airports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightTiming {
    pub key: FlightKey,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
}

/// Cheapest cash fare for a fare class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightCashPrice {
    pub key: FlightKey,
    pub price: Money,
}

/// Cheapest award redemption for a fare class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightMilesPrice {
    pub key: FlightKey,
    /// Points per passenger; `None` when the site did not quote any
    pub points_required: Option<u64>,
    /// Taxes and fees paid in cash on top of the points
    pub tax: Money,
}

/// A flight present in all three searches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightTimingAndPrices {
    pub timing: FlightTiming,
    pub cash: FlightCashPrice,
    pub miles: FlightMilesPrice,
}

impl FlightTimingAndPrices {
    #[must_use]
    pub fn key(&self) -> &FlightKey {
        &self.timing.key
    }

    /// Cash value of one point, in cents: `(price - tax) * 100 / points`.
    ///
    /// `Ok(None)` when no points are quoted or the quote is zero. Price and
    /// tax in different currencies is an error.
    pub fn cents_per_point(&self) -> Result<Option<Decimal>, MoneyError> {
        let points = match self.miles.points_required {
            Some(points) if points > 0 => points,
            _ => return Ok(None),
        };

        let cash_value = self.cash.price.checked_sub(&self.miles.tax)?;
        Ok(Some(
            cash_value.amount * Decimal::ONE_HUNDRED / Decimal::from(points),
        ))
    }
}
