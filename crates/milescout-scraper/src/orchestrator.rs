//! Flight scraper orchestration.
//!
//! [`FlightScraper`] issues the timing, cash and miles searches against one
//! backend and joins the results per flight. [`scrape_with_retries`] wraps a
//! whole run in the retry coordinator, opening a fresh backend on the proxy
//! each attempt draws.

use crate::error::Result;
use crate::flight::{
    FlightCashPrice, FlightKey, FlightMilesPrice, FlightTiming, FlightTimingAndPrices,
};
use crate::proxy::ProxyChoice;
use crate::response::FlightSearchResponse;
use crate::retry::RetryCoordinator;
use crate::search::FlightSearchApi;
use crate::url_builder::FlightSearchRequest;
use milescout_core::{AirportCode, FareClass, PaymentMode, TravelDate};
use std::collections::HashMap;
use std::future::Future;

/// One route and date to price, independent of payment mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Departure airport
    pub origin: AirportCode,
    /// Arrival airport
    pub destination: AirportCode,
    /// Travel date
    pub date: TravelDate,
    /// Adult passengers
    pub passengers: u32,
    /// Fare class cash and award offers are picked from
    pub fare_class: FareClass,
    /// Ignore itineraries with connections
    pub direct_only: bool,
}

impl SearchQuery {
    /// Search page request for this query priced in `mode`.
    #[must_use]
    pub fn request(&self, mode: PaymentMode) -> FlightSearchRequest {
        FlightSearchRequest::new(
            self.origin.clone(),
            self.destination.clone(),
            self.date,
            self.passengers,
            mode,
        )
    }
}

/// Runs the three searches of one analysis against a backend.
pub struct FlightScraper<A> {
    api: A,
    search_url: String,
}

impl<A: FlightSearchApi> FlightScraper<A> {
    /// `search_url` is the search page the request parameters are appended to.
    pub fn new(api: A, search_url: impl Into<String>) -> Self {
        Self {
            api,
            search_url: search_url.into(),
        }
    }

    async fn search(
        &mut self,
        req: &FlightSearchRequest,
        direct_only: bool,
    ) -> Result<Vec<FlightSearchResponse>> {
        let url = req.to_url(&self.search_url);
        self.api.search_flight_details(&url, direct_only).await
    }

    /// First-segment timing per flight.
    pub async fn scrape_flight_timing(
        &mut self,
        req: &FlightSearchRequest,
        direct_only: bool,
    ) -> Result<HashMap<FlightKey, FlightTiming>> {
        let flights = self.search(req, direct_only).await?;
        Ok(flights
            .iter()
            .filter_map(|f| f.first_segment_timing())
            .map(|t| (t.key.clone(), t))
            .collect())
    }

    /// Cheapest cash fare in `fare_class` per flight.
    pub async fn scrape_cash_prices(
        &mut self,
        req: &FlightSearchRequest,
        fare_class: FareClass,
        direct_only: bool,
    ) -> Result<HashMap<FlightKey, FlightCashPrice>> {
        let flights = self.search(req, direct_only).await?;
        Ok(flights
            .iter()
            .filter_map(|f| f.cheapest_cash_price(fare_class))
            .map(|c| (c.key.clone(), c))
            .collect())
    }

    /// Cheapest award price in `fare_class` per flight.
    pub async fn scrape_miles_prices(
        &mut self,
        req: &FlightSearchRequest,
        fare_class: FareClass,
        direct_only: bool,
    ) -> Result<HashMap<FlightKey, FlightMilesPrice>> {
        let flights = self.search(req, direct_only).await?;
        Ok(flights
            .iter()
            .filter_map(|f| f.cheapest_miles(fare_class))
            .map(|m| (m.key.clone(), m))
            .collect())
    }

    /// Timing and cash come from the same revenue search; the backend cache
    /// keeps that to one page load. Miles come from the award search.
    pub async fn run(&mut self, query: &SearchQuery) -> Result<Vec<FlightTimingAndPrices>> {
        let cash_req = query.request(PaymentMode::Revenue);

        tracing::info!(
            "Searching flight timings: {} -> {} on {}",
            query.origin,
            query.destination,
            query.date
        );
        let timings = self.scrape_flight_timing(&cash_req, query.direct_only).await?;

        tracing::info!("Searching flight prices ({})", query.fare_class);
        let cash = self
            .scrape_cash_prices(&cash_req, query.fare_class, query.direct_only)
            .await?;

        let miles_req = query.request(PaymentMode::Award);
        tracing::info!("Searching flight miles redemption ({})", query.fare_class);
        let miles = self
            .scrape_miles_prices(&miles_req, query.fare_class, query.direct_only)
            .await?;

        let merged = merge_flights(timings, cash, miles);
        for flight in &merged {
            let cpp = flight.cents_per_point()?;
            tracing::debug!(flight = %flight.key(), cpp = ?cpp, "Merged flight");
        }

        tracing::info!(count = merged.len(), "Flights with timing, cash and miles");
        Ok(merged)
    }

    /// The backend searches run against.
    pub fn api_mut(&mut self) -> &mut A {
        &mut self.api
    }

    /// Give the backend back.
    pub fn into_inner(self) -> A {
        self.api
    }
}

/// Join the three maps on flight key.
///
/// Only keys present in all three make it into the output; every other
/// timing key is logged with the pieces it lacked. Output is ordered by
/// departure time, then key.
#[must_use]
pub fn merge_flights(
    timings: HashMap<FlightKey, FlightTiming>,
    mut cash: HashMap<FlightKey, FlightCashPrice>,
    mut miles: HashMap<FlightKey, FlightMilesPrice>,
) -> Vec<FlightTimingAndPrices> {
    let mut merged = Vec::with_capacity(timings.len());

    for (key, timing) in timings {
        match (cash.remove(&key), miles.remove(&key)) {
            (Some(cash), Some(miles)) => merged.push(FlightTimingAndPrices {
                timing,
                cash,
                miles,
            }),
            (cash, miles) => {
                tracing::warn!(
                    "Skipping flight {} due to missing data: cash_price={}, mile_price={}",
                    key,
                    if cash.is_some() { "present" } else { "missing" },
                    if miles.is_some() { "present" } else { "missing" },
                );
            }
        }
    }

    merged.sort_by(|a, b| {
        a.timing
            .departure
            .cmp(&b.timing.departure)
            .then_with(|| a.key().cmp(b.key()))
    });
    merged
}

/// Run a full analysis, retrying on a new proxy after failures.
///
/// `connect` opens a backend for the proxy an attempt drew; the backend is
/// closed after the attempt whether or not it succeeded.
pub async fn scrape_with_retries<C, Fut, A>(
    coordinator: &mut RetryCoordinator,
    query: &SearchQuery,
    search_url: &str,
    mut connect: C,
) -> Result<Vec<FlightTimingAndPrices>>
where
    C: FnMut(ProxyChoice) -> Fut,
    Fut: Future<Output = Result<A>>,
    A: FlightSearchApi,
{
    coordinator
        .run_with_retries(|proxy| {
            let backend = connect(proxy);
            async move {
                let mut scraper = FlightScraper::new(backend.await?, search_url);
                let outcome = scraper.run(query).await;
                if let Err(e) = scraper.api_mut().close().await {
                    tracing::warn!("Failed to close search backend: {}", e);
                }
                outcome
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use milescout_core::Money;
    use rust_decimal::Decimal;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn timing(key: &str, hour: u32) -> (FlightKey, FlightTiming) {
        let key = FlightKey::from(key);
        (
            key.clone(),
            FlightTiming {
                key,
                departure: at(hour),
                arrival: at(hour + 2),
            },
        )
    }

    fn cash(key: &str) -> (FlightKey, FlightCashPrice) {
        let key = FlightKey::from(key);
        (
            key.clone(),
            FlightCashPrice {
                key,
                price: Money::new(Decimal::from(100), "USD"),
            },
        )
    }

    fn miles(key: &str) -> (FlightKey, FlightMilesPrice) {
        let key = FlightKey::from(key);
        (
            key.clone(),
            FlightMilesPrice {
                key,
                points_required: Some(8000),
                tax: Money::new(Decimal::from(20), "USD"),
            },
        )
    }

    #[test]
    fn test_merge_is_strict_intersection() {
        let merged = merge_flights(
            HashMap::from([timing("A", 8), timing("B", 9)]),
            HashMap::from([cash("A")]),
            HashMap::from([miles("A"), miles("C")]),
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].key().as_str(), "A");
        assert_eq!(merged[0].cash.key.as_str(), "A");
        assert_eq!(merged[0].miles.key.as_str(), "A");
    }

    #[test]
    fn test_merge_ignores_prices_without_timing() {
        let merged = merge_flights(
            HashMap::new(),
            HashMap::from([cash("A")]),
            HashMap::from([miles("A")]),
        );
        assert!(merged.is_empty());
    }

    #[test]
    fn test_merge_orders_by_departure() {
        let merged = merge_flights(
            HashMap::from([timing("AA300", 15), timing("AA100", 6), timing("AA200", 11)]),
            HashMap::from([cash("AA100"), cash("AA200"), cash("AA300")]),
            HashMap::from([miles("AA100"), miles("AA200"), miles("AA300")]),
        );

        let keys: Vec<&str> = merged.iter().map(|f| f.key().as_str()).collect();
        assert_eq!(keys, vec!["AA100", "AA200", "AA300"]);
        assert_eq!(merged[0].cents_per_point().unwrap(), Some(Decimal::ONE));
    }

    #[test]
    fn test_query_requests_differ_only_in_mode() {
        let query = SearchQuery {
            origin: AirportCode::new("DFW").unwrap(),
            destination: AirportCode::new("LAX").unwrap(),
            date: "2025-07-04".parse().unwrap(),
            passengers: 2,
            fare_class: FareClass::Coach,
            direct_only: true,
        };
        let cash = query.request(PaymentMode::Revenue);
        let award = query.request(PaymentMode::Award);
        assert_eq!(cash.adults, 2);
        assert_eq!(cash.with_payment_mode(PaymentMode::Award), award);
    }
}
