//! Typed model of the itinerary search API's slice list.
//!
//! Only the fields the correlation step reads are modelled; everything else in
//! the payload is ignored. Timestamps are kept as the local wall-clock time at
//! the airport, discarding any UTC offset.

use crate::error::{Result, ScrapeError};
use crate::flight::{FlightCashPrice, FlightKey, FlightMilesPrice, FlightTiming};
use chrono::{DateTime, NaiveDateTime};
use milescout_core::{FareClass, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// An airport as described in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    pub code: String,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Marketing carrier and flight number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub carrier_code: String,
    pub flight_number: String,
}

impl Flight {
    /// Carrier code followed by flight number, e.g. `AA1234`.
    #[must_use]
    pub fn designator(&self) -> String {
        format!("{}{}", self.carrier_code, self.flight_number)
    }
}

/// One flown segment of a slice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub flight: Flight,
    pub origin: Airport,
    pub destination: Airport,
    #[serde(deserialize_with = "local_datetime")]
    pub departure_date_time: NaiveDateTime,
    #[serde(deserialize_with = "local_datetime")]
    pub arrival_date_time: NaiveDateTime,
}

/// Aggregate pricing over all passengers for one offer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlicePricing {
    pub all_passenger_display_total: Money,
    #[serde(default)]
    pub all_passenger_display_tax_total: Option<Money>,
}

/// One fare-class offer for a slice.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingDetail {
    pub product_type: FareClass,
    #[serde(default)]
    pub per_passenger_award_points: Option<u64>,
    pub per_passenger_taxes_and_fees: Money,
    #[serde(default)]
    pub per_passenger_display_total: Option<Money>,
    #[serde(default)]
    pub slice_pricing: Option<SlicePricing>,
    #[serde(default)]
    pub seats_remaining: Option<u32>,
}

impl PricingDetail {
    /// Amount offers are ordered by. An offer without slice pricing sorts as zero.
    fn sort_amount(&self) -> Decimal {
        self.slice_pricing
            .as_ref()
            .map_or(Decimal::ZERO, |p| p.all_passenger_display_total.amount)
    }
}

/// One scheduled option (slice) in a search result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchResponse {
    pub origin: Airport,
    pub destination: Airport,
    #[serde(deserialize_with = "local_datetime")]
    pub departure_date_time: NaiveDateTime,
    #[serde(deserialize_with = "local_datetime")]
    pub arrival_date_time: NaiveDateTime,
    #[serde(default)]
    pub duration_in_minutes: Option<u32>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub pricing_detail: Vec<PricingDetail>,
}

impl FlightSearchResponse {
    /// Parse every slice out of an itinerary API payload (`{"slices": [...]}`).
    pub fn parse_slices(payload: &serde_json::Value) -> Result<Vec<Self>> {
        let slices = payload
            .get("slices")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| ScrapeError::ResponseFormat("payload has no slices list".to_string()))?;

        slices
            .iter()
            .map(|slice| Self::deserialize(slice).map_err(ScrapeError::from))
            .collect()
    }

    #[must_use]
    pub fn correlation_key(&self) -> FlightKey {
        FlightKey::from_designators(self.segments.iter().map(|s| s.flight.designator()))
    }

    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.segments.len() == 1
    }

    /// Cheapest offer in `fare_class`, ties resolved by payload order.
    fn cheapest_offer(&self, fare_class: FareClass) -> Option<&PricingDetail> {
        let mut offers: Vec<&PricingDetail> = self
            .pricing_detail
            .iter()
            .filter(|d| d.product_type == fare_class)
            .collect();
        offers.sort_by_key(|d| d.sort_amount());
        offers.into_iter().next()
    }

    /// Total cash fare of the cheapest offer in `fare_class`.
    ///
    /// `None` when no offer matches or the cheapest one carries no slice pricing.
    #[must_use]
    pub fn cheapest_cash_price(&self, fare_class: FareClass) -> Option<FlightCashPrice> {
        let pricing = self.cheapest_offer(fare_class)?.slice_pricing.as_ref()?;
        Some(FlightCashPrice {
            key: self.correlation_key(),
            price: pricing.all_passenger_display_total.clone(),
        })
    }

    /// Award points and cash taxes of the cheapest offer in `fare_class`.
    #[must_use]
    pub fn cheapest_miles(&self, fare_class: FareClass) -> Option<FlightMilesPrice> {
        let offer = self.cheapest_offer(fare_class)?;
        Some(FlightMilesPrice {
            key: self.correlation_key(),
            points_required: offer.per_passenger_award_points,
            tax: offer.per_passenger_taxes_and_fees.clone(),
        })
    }

    /// Departure and arrival of the first segment.
    ///
    /// Connections are not reconciled: a multi-segment slice reports the
    /// first leg's times under the whole slice's key.
    #[must_use]
    pub fn first_segment_timing(&self) -> Option<FlightTiming> {
        let first = self.segments.first()?;
        Some(FlightTiming {
            key: self.correlation_key(),
            departure: first.departure_date_time,
            arrival: first.arrival_date_time,
        })
    }
}

/// ISO-8601 timestamp with or without an offset, as local time.
fn local_datetime<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_local_datetime(&raw).map_err(serde::de::Error::custom)
}

fn parse_local_datetime(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}
