//! Report document handed to the output collaborator.

use crate::error::Result;
use crate::flight::FlightTimingAndPrices;
use crate::orchestrator::SearchQuery;
use milescout_core::CurrencyCode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

const TIME_FORMAT_HH_MM: &str = "%H:%M";

/// One merged flight, with amounts as plain numbers in the report currency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightReport {
    pub flight_number: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub points_required: Option<u64>,
    pub cash_price: f64,
    pub taxes_fees: f64,
    pub currency: String,
    /// Cents per point. Null when there is no point price or when cash and
    /// taxes cancel out, since a zero valuation is not a useful figure.
    pub cpp: Option<f64>,
}

impl FlightReport {
    /// Fails when either amount is not held in `expected_currency`.
    pub fn from_flight(flight: &FlightTimingAndPrices, expected_currency: &CurrencyCode) -> Result<Self> {
        let cash_price = flight.cash.price.amount_in(expected_currency)?;
        let taxes_fees = flight.miles.tax.amount_in(expected_currency)?;
        let cpp = flight.cents_per_point()?;

        Ok(Self {
            flight_number: flight.key().to_string(),
            departure_time: flight.timing.departure.format(TIME_FORMAT_HH_MM).to_string(),
            arrival_time: flight.timing.arrival.format(TIME_FORMAT_HH_MM).to_string(),
            points_required: flight.miles.points_required,
            cash_price: as_number(cash_price),
            taxes_fees: as_number(taxes_fees),
            currency: expected_currency.to_string(),
            cpp: cpp.filter(|c| !c.is_zero()).map(as_number),
        })
    }
}

fn as_number(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or_default()
}

/// What was searched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMetadata {
    pub origin: String,
    pub destination: String,
    pub date: String,
    pub passengers: u32,
    pub cabin_class: String,
}

impl From<&SearchQuery> for SearchMetadata {
    fn from(query: &SearchQuery) -> Self {
        Self {
            origin: query.origin.to_string(),
            destination: query.destination.to_string(),
            date: query.date.to_string(),
            passengers: query.passengers,
            cabin_class: query.fare_class.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub search_metadata: SearchMetadata,
    pub flights: Vec<FlightReport>,
    pub total_results: usize,
}

impl SearchReport {
    pub fn build(
        query: &SearchQuery,
        flights: &[FlightTimingAndPrices],
        expected_currency: &CurrencyCode,
    ) -> Result<Self> {
        let flights = flights
            .iter()
            .map(|f| FlightReport::from_flight(f, expected_currency))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            search_metadata: SearchMetadata::from(query),
            total_results: flights.len(),
            flights,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
