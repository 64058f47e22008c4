use async_trait::async_trait;
use milescout_core::{AirportCode, FareClass};
use milescout_scraper::{
    scrape_with_retries, FlightScraper, FlightSearchApi, FlightSearchResponse, ProxyChoice,
    ProxyRotation, RetryCoordinator, RetryPolicy, ScrapeError, SearchQuery,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SEARCH_URL: &str = "https://www.aa.com/booking/search";

fn money(amount: f64) -> Value {
    json!({ "amount": amount, "currency": "USD" })
}

fn offer(fare_class: &str, total: f64, points: u64, tax: f64) -> Value {
    json!({
        "productType": fare_class,
        "perPassengerAwardPoints": points,
        "perPassengerTaxesAndFees": money(tax),
        "perPassengerDisplayTotal": money(total),
        "slicePricing": {
            "allPassengerDisplayTotal": money(total),
            "allPassengerDisplayTaxTotal": money(tax),
            "perPassengerAwardPoints": points.to_string(),
        },
    })
}

fn slice(flight_numbers: &[&str], departure: &str, offers: Vec<Value>) -> Value {
    let segments: Vec<Value> = flight_numbers
        .iter()
        .map(|n| {
            json!({
                "flight": { "carrierCode": "AA", "carrierName": "American Airlines", "flightNumber": n },
                "origin": { "code": "DFW" },
                "destination": { "code": "LAX" },
                "departureDateTime": departure,
                "arrivalDateTime": "2025-07-04T12:00:00.000-07:00",
                "legs": [],
            })
        })
        .collect();

    json!({
        "origin": { "code": "DFW" },
        "destination": { "code": "LAX" },
        "departureDateTime": departure,
        "arrivalDateTime": "2025-07-04T12:00:00.000-07:00",
        "durationInMinutes": 240,
        "segments": segments,
        "pricingDetail": offers,
    })
}

fn revenue_payload() -> Value {
    json!({ "slices": [
        slice(&["100"], "2025-07-04T06:00:00.000-05:00", vec![
            offer("COACH", 249.6, 0, 5.6),
            offer("COACH", 129.4, 0, 5.6),
            offer("BUSINESS", 899.0, 0, 5.6),
        ]),
        slice(&["200", "300"], "2025-07-04T08:30:00.000-05:00", vec![offer("COACH", 180.0, 0, 5.6)]),
        slice(&["400"], "2025-07-04T10:00:00.000-05:00", vec![offer("BUSINESS", 700.0, 0, 5.6)]),
    ]})
}

fn award_payload() -> Value {
    json!({ "slices": [
        slice(&["100"], "2025-07-04T06:00:00.000-05:00", vec![offer("COACH", 5.6, 12_400, 5.6)]),
        slice(&["200", "300"], "2025-07-04T08:30:00.000-05:00", vec![offer("COACH", 11.2, 20_000, 11.2)]),
        slice(&["500"], "2025-07-04T14:00:00.000-05:00", vec![offer("COACH", 5.6, 7_500, 5.6)]),
    ]})
}

/// Serves canned payloads by payment mode and counts what it was asked.
#[derive(Default)]
struct FakeSearch {
    urls: Vec<String>,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl FlightSearchApi for FakeSearch {
    async fn search_flight_details(
        &mut self,
        search_url: &str,
        direct_only: bool,
    ) -> milescout_scraper::Result<Vec<FlightSearchResponse>> {
        self.urls.push(search_url.to_string());
        let payload = if search_url.contains("searchType=Award") {
            award_payload()
        } else {
            revenue_payload()
        };
        let flights = FlightSearchResponse::parse_slices(&payload)?;
        Ok(flights
            .into_iter()
            .filter(|f| !direct_only || f.is_direct())
            .collect())
    }

    async fn close(&mut self) -> milescout_scraper::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Backend whose page never yields an itinerary response.
struct BlockedSearch {
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl FlightSearchApi for BlockedSearch {
    async fn search_flight_details(
        &mut self,
        search_url: &str,
        _direct_only: bool,
    ) -> milescout_scraper::Result<Vec<FlightSearchResponse>> {
        Err(ScrapeError::CaptureFailure {
            url: search_url.to_string(),
        })
    }

    async fn close(&mut self) -> milescout_scraper::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn query(direct_only: bool) -> SearchQuery {
    SearchQuery {
        origin: AirportCode::new("DFW").unwrap(),
        destination: AirportCode::new("LAX").unwrap(),
        date: "2025-07-04".parse().unwrap(),
        passengers: 1,
        fare_class: FareClass::Coach,
        direct_only,
    }
}

fn coordinator() -> RetryCoordinator {
    let proxies = vec![
        "http://proxy-a.example:8080".to_string(),
        "http://proxy-b.example:8080".to_string(),
    ];
    RetryCoordinator::new(
        ProxyRotation::new(&proxies, true, Duration::from_secs(600)),
        RetryPolicy::default(),
    )
}

#[tokio::test]
async fn test_run_joins_three_searches() {
    let mut scraper = FlightScraper::new(FakeSearch::default(), SEARCH_URL);
    let flights = scraper.run(&query(false)).await.expect("run");

    let keys: Vec<&str> = flights.iter().map(|f| f.key().as_str()).collect();
    assert_eq!(keys, vec!["AA100", "AA200_AA300"]);

    let first = &flights[0];
    assert_eq!(first.cash.price.amount, Decimal::new(1294, 1));
    assert_eq!(first.miles.points_required, Some(12_400));
    // (129.40 - 5.60) * 100 / 12400
    let cpp = first.cents_per_point().unwrap().expect("points quoted");
    assert_eq!(cpp.round_dp(4), Decimal::new(9984, 4));
    assert_eq!(first.timing.departure.format("%H:%M").to_string(), "06:00");

    let backend = scraper.into_inner();
    assert_eq!(backend.urls.len(), 3);
    assert_eq!(backend.urls[0], backend.urls[1]);
    assert!(backend.urls[0].contains("searchType=Revenue"));
    assert!(backend.urls[2].contains("searchType=Award"));
    assert!(backend.urls.iter().all(|u| u.starts_with(SEARCH_URL)));
}

#[tokio::test]
async fn test_run_direct_only_drops_connections() {
    let mut scraper = FlightScraper::new(FakeSearch::default(), SEARCH_URL);
    let flights = scraper.run(&query(true)).await.expect("run");

    assert_eq!(flights.len(), 1);
    assert_eq!(flights[0].key().as_str(), "AA100");
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_on_next_proxy() {
    let mut retry = coordinator();
    let closed = Arc::new(AtomicUsize::new(0));
    let mut drawn: Vec<ProxyChoice> = Vec::new();

    let flights = scrape_with_retries(&mut retry, &query(false), SEARCH_URL, |proxy| {
        drawn.push(proxy.clone());
        let closed = closed.clone();
        async move {
            match proxy {
                ProxyChoice::Direct => Err(ScrapeError::CaptureFailure {
                    url: SEARCH_URL.to_string(),
                }),
                ProxyChoice::Proxy(_) => Ok(FakeSearch {
                    urls: Vec::new(),
                    closed,
                }),
            }
        }
    })
    .await
    .expect("second attempt succeeds");

    assert_eq!(flights.len(), 2);
    assert_eq!(drawn.len(), 2);
    assert_eq!(drawn[0], ProxyChoice::Direct);
    assert!(retry.rotation().is_blocked(&ProxyChoice::Direct));
    assert!(!retry.rotation().is_blocked(&drawn[1]));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_failures_exhaust_retries_and_close_every_backend() {
    let mut retry = coordinator();
    let closed = Arc::new(AtomicUsize::new(0));

    let result = scrape_with_retries(&mut retry, &query(false), SEARCH_URL, |_| {
        let closed = closed.clone();
        async move { Ok(BlockedSearch { closed }) }
    })
    .await;

    match result {
        Err(ScrapeError::ExhaustedRetries { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, ScrapeError::CaptureFailure { .. }));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(closed.load(Ordering::SeqCst), 3);
    assert!(retry.rotation().is_blocked(&ProxyChoice::Direct));
    assert!(retry
        .rotation()
        .is_blocked(&ProxyChoice::Proxy("http://proxy-b.example:8080".to_string())));
}
