//! Shared types used across milescout.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::MilescoutError;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for IATA airport codes with validation.
///
/// Airport codes are three ASCII letters; input is upper-cased before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AirportCode(String);

impl AirportCode {
    /// Create a new `AirportCode` from a string.
    ///
    /// # Errors
    /// Returns error if the code is not three letters.
    pub fn new(code: impl AsRef<str>) -> Result<Self, MilescoutError> {
        let code = code.as_ref().trim().to_ascii_uppercase();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), MilescoutError> {
        static AIRPORT_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = AIRPORT_REGEX.get_or_init(|| Regex::new(r"^[A-Z]{3}$").expect("valid regex"));

        if regex.is_match(code) {
            Ok(())
        } else {
            Err(MilescoutError::Validation(format!(
                "invalid airport code: must be three letters, got '{code}'"
            )))
        }
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AirportCode {
    type Err = MilescoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Travel date in `YYYY-MM-DD` form, as the booking site expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TravelDate(NaiveDate);

impl TravelDate {
    /// Create a travel date from a calendar date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Get the inner `NaiveDate`.
    #[must_use]
    pub fn as_date(&self) -> &NaiveDate {
        &self.0
    }
}

impl FromStr for TravelDate {
    type Err = MilescoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|e| MilescoutError::Validation(format!("invalid travel date '{s}': {e}")))
    }
}

impl fmt::Display for TravelDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Named cabin/fare tier used to pick one offer among several for a flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FareClass {
    /// Basic economy
    BasicEconomy,
    /// Main cabin
    Coach,
    /// Main cabin extra
    CoachPlus,
    /// Main select
    CoachSelect,
    /// Flexible main cabin
    CoachFlexible,
    /// Premium economy
    PremiumEconomy,
    /// Flexible premium economy
    PremiumEconomyFlexible,
    /// Business
    Business,
    /// Flexible business
    BusinessFlexible,
    /// First
    First,
    /// Flexible first
    FirstFlexible,
    /// Any tier this client does not know about
    #[serde(other)]
    Other,
}

impl FareClass {
    /// Wire name of the fare class, e.g. `PREMIUM_ECONOMY`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicEconomy => "BASIC_ECONOMY",
            Self::Coach => "COACH",
            Self::CoachPlus => "COACH_PLUS",
            Self::CoachSelect => "COACH_SELECT",
            Self::CoachFlexible => "COACH_FLEXIBLE",
            Self::PremiumEconomy => "PREMIUM_ECONOMY",
            Self::PremiumEconomyFlexible => "PREMIUM_ECONOMY_FLEXIBLE",
            Self::Business => "BUSINESS",
            Self::BusinessFlexible => "BUSINESS_FLEXIBLE",
            Self::First => "FIRST",
            Self::FirstFlexible => "FIRST_FLEXIBLE",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for FareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a search prices in currency or in loyalty points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMode {
    /// Cash fares
    Revenue,
    /// Award (miles) fares
    Award,
}

impl PaymentMode {
    /// Value of the `searchType` query parameter.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "Revenue",
            Self::Award => "Award",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
