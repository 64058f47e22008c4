//! Flight search backends.
//!
//! A backend turns a search page URL into parsed slices by loading the page
//! in a browser and capturing the itinerary API response it triggers. Two
//! implementations exist: [`ChromiumSearch`] launches a plain headless
//! Chromium, [`StealthSearch`] adds a randomized fingerprint, a homepage
//! warm-up and a wait for the result grid.

mod chromium;
mod stealth;

pub use chromium::ChromiumSearch;
pub use stealth::StealthSearch;

use crate::error::{Result, ScrapeError};
use crate::proxy::ProxyChoice;
use crate::response::FlightSearchResponse;
use async_trait::async_trait;
use milescout_browser::{
    BrowserActions, BrowserEngine, BrowserSession, CaptureWait, LaunchOptions, NetworkSpy,
};
use milescout_core::{AppConfig, BackendKind};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of parsed flight search results for a search page URL.
#[async_trait]
pub trait FlightSearchApi: Send {
    /// Load `search_url` and return every slice it lists, or only direct ones.
    ///
    /// Repeating a URL within one session is answered from cache. Capturing
    /// no itinerary response is [`ScrapeError::CaptureFailure`].
    async fn search_flight_details(
        &mut self,
        search_url: &str,
        direct_only: bool,
    ) -> Result<Vec<FlightSearchResponse>>;

    /// Release the browser. Further searches are not possible afterwards.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: FlightSearchApi + ?Sized> FlightSearchApi for Box<T> {
    async fn search_flight_details(
        &mut self,
        search_url: &str,
        direct_only: bool,
    ) -> Result<Vec<FlightSearchResponse>> {
        (**self).search_flight_details(search_url, direct_only).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

/// Launch the backend selected by `config.browser.backend`, routed through `proxy`.
pub async fn connect_backend(
    config: &AppConfig,
    proxy: &ProxyChoice,
) -> Result<Box<dyn FlightSearchApi>> {
    info!(backend = %config.browser.backend, proxy = %proxy, "Starting search backend");
    match config.browser.backend {
        BackendKind::Chromium => Ok(Box::new(ChromiumSearch::launch(config, proxy).await?)),
        BackendKind::Stealth => Ok(Box::new(StealthSearch::launch(config, proxy).await?)),
    }
}

/// Parsed slices per search URL for one browser session.
///
/// Entries hold the unfiltered list so that direct and non-direct queries
/// for the same URL share one page load.
#[derive(Debug, Default)]
pub struct SearchCache {
    by_url: HashMap<String, Vec<FlightSearchResponse>>,
}

impl SearchCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached slices for `search_url`, filtered for this call.
    #[must_use]
    pub fn get(&self, search_url: &str, direct_only: bool) -> Option<Vec<FlightSearchResponse>> {
        self.by_url
            .get(search_url)
            .map(|flights| keep_direct(flights.clone(), direct_only))
    }

    /// Remember the unfiltered slices for `search_url`.
    pub fn insert(&mut self, search_url: &str, flights: Vec<FlightSearchResponse>) {
        self.by_url.insert(search_url.to_string(), flights);
    }

    /// Number of cached URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}

/// Drop connecting itineraries when `direct_only` is set.
#[must_use]
pub fn keep_direct(flights: Vec<FlightSearchResponse>, direct_only: bool) -> Vec<FlightSearchResponse> {
    if direct_only {
        flights.into_iter().filter(FlightSearchResponse::is_direct).collect()
    } else {
        flights
    }
}

/// Parse the first captured itinerary response.
pub fn parse_capture(search_url: &str, spy: &NetworkSpy) -> Result<Vec<FlightSearchResponse>> {
    let first = spy
        .responses()
        .first()
        .ok_or_else(|| ScrapeError::CaptureFailure {
            url: search_url.to_string(),
        })?;

    if spy.responses().len() > 1 {
        debug!(
            captured = spy.responses().len(),
            "More than one itinerary response captured, using the first"
        );
    }
    FlightSearchResponse::parse_slices(&first.json_payload)
}

/// A page that can load a URL while feeding its traffic into a spy.
#[async_trait]
pub trait PageCapture: Send + Sync {
    async fn capture(
        &self,
        url: &str,
        spy: &mut NetworkSpy,
        wait: &CaptureWait,
    ) -> milescout_browser::Result<()>;
}

#[async_trait]
impl PageCapture for BrowserSession {
    async fn capture(
        &self,
        url: &str,
        spy: &mut NetworkSpy,
        wait: &CaptureWait,
    ) -> milescout_browser::Result<()> {
        BrowserSession::capture(self, url, spy, wait).await
    }
}

/// Browser, page and capture state shared by both backends.
struct CaptureSession<P = BrowserSession> {
    engine: Option<BrowserEngine>,
    session: P,
    spy: NetworkSpy,
    wait: CaptureWait,
    cache: SearchCache,
}

impl CaptureSession {
    async fn open(config: &AppConfig, options: LaunchOptions, wait: CaptureWait) -> Result<Self> {
        let engine = BrowserEngine::launch(options).await?;
        let session = match engine.new_session().await {
            Ok(session) => session,
            Err(e) => {
                if let Err(close_err) = engine.close().await {
                    warn!("Failed to close browser after session error: {}", close_err);
                }
                return Err(e.into());
            }
        };

        let mut inner = Self::with_page(
            session,
            NetworkSpy::for_endpoint(&config.site.itinerary_api_url),
            wait,
        );
        inner.engine = Some(engine);
        Ok(inner)
    }

    async fn warm_up(&self, url: &str, selector: &str, timeout: Duration) {
        info!("Warming up session with {}", url);
        let warmed = async {
            self.session.navigate(url).await?;
            self.session.wait_for_selector(selector, timeout).await
        };
        if let Err(e) = warmed.await {
            warn!("Session warm-up failed, continuing anyway: {}", e);
        }
    }
}

impl<P: PageCapture> CaptureSession<P> {
    fn with_page(session: P, spy: NetworkSpy, wait: CaptureWait) -> Self {
        Self {
            engine: None,
            session,
            spy,
            wait,
            cache: SearchCache::new(),
        }
    }

    async fn search(
        &mut self,
        search_url: &str,
        direct_only: bool,
    ) -> Result<Vec<FlightSearchResponse>> {
        if let Some(flights) = self.cache.get(search_url, direct_only) {
            debug!("Search served from session cache");
            return Ok(flights);
        }

        info!("Fetching search URL: {}", search_url);
        self.spy.clear();
        self.session
            .capture(search_url, &mut self.spy, &self.wait)
            .await?;
        self.spy.log_captured();

        let flights = parse_capture(search_url, &self.spy)?;
        info!(count = flights.len(), "Flight search completed");

        self.cache.insert(search_url, flights.clone());
        Ok(keep_direct(flights, direct_only))
    }

    async fn close(&mut self) -> Result<()> {
        match self.engine.take() {
            Some(engine) => engine.close().await.map_err(ScrapeError::from),
            None => Ok(()),
        }
    }
}

fn launch_options(config: &AppConfig, proxy: &ProxyChoice) -> LaunchOptions {
    LaunchOptions {
        headless: config.browser.headless,
        window_width: config.browser.window_width,
        window_height: config.browser.window_height,
        proxy: proxy.proxy_url().map(str::to_string),
        chrome_executable: config.browser.chrome_executable.clone(),
        fingerprint: None,
        navigation_timeout: Duration::from_secs(config.browser.navigation_timeout_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use milescout_browser::ObservedResponse;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const ITINERARY: &str = "https://www.aa.com/booking/api/search/itinerary";
    const SEARCH: &str = "https://www.aa.com/booking/search?searchType=Revenue";

    fn slice(flight_numbers: &[&str]) -> serde_json::Value {
        let segments: Vec<_> = flight_numbers
            .iter()
            .map(|n| {
                json!({
                    "flight": { "carrierCode": "AA", "flightNumber": n },
                    "origin": { "code": "DFW" },
                    "destination": { "code": "LAX" },
                    "departureDateTime": "2025-07-04T06:00:00.000-05:00",
                    "arrivalDateTime": "2025-07-04T07:15:00.000-07:00",
                })
            })
            .collect();
        json!({
            "origin": { "code": "DFW" },
            "destination": { "code": "LAX" },
            "departureDateTime": "2025-07-04T06:00:00.000-05:00",
            "arrivalDateTime": "2025-07-04T07:15:00.000-07:00",
            "segments": segments,
        })
    }

    fn flights() -> Vec<FlightSearchResponse> {
        FlightSearchResponse::parse_slices(&json!({
            "slices": [slice(&["100"]), slice(&["200", "300"])]
        }))
        .expect("parse")
    }

    #[test]
    fn test_keep_direct() {
        assert_eq!(keep_direct(flights(), false).len(), 2);
        let direct = keep_direct(flights(), true);
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].correlation_key().as_str(), "AA100");
    }

    #[test]
    fn test_cache_filters_per_call() {
        let mut cache = SearchCache::new();
        assert!(cache.get(SEARCH, false).is_none());

        cache.insert(SEARCH, flights());
        assert_eq!(cache.get(SEARCH, true).map(|f| f.len()), Some(1));
        assert_eq!(cache.get(SEARCH, false).map(|f| f.len()), Some(2));
        assert!(cache.get("https://www.aa.com/booking/search?searchType=Award", false).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parse_capture_requires_a_response() {
        let spy = NetworkSpy::for_endpoint(ITINERARY);
        let err = parse_capture(SEARCH, &spy).unwrap_err();
        assert!(matches!(err, ScrapeError::CaptureFailure { ref url } if url == SEARCH));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_capture_uses_first_response() {
        let mut spy = NetworkSpy::for_endpoint(ITINERARY);
        let first = json!({ "slices": [slice(&["100"])] });
        let second = json!({ "slices": [slice(&["200"]), slice(&["300"])] });
        for payload in [first, second] {
            spy.record_response(
                ObservedResponse {
                    url: ITINERARY.to_string(),
                    status: 200,
                },
                payload.to_string().as_bytes(),
            )
            .expect("record");
        }

        let parsed = parse_capture(SEARCH, &spy).expect("parse");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].correlation_key().as_str(), "AA100");
    }

    /// Page that hands out one scripted itinerary payload per load.
    #[derive(Default)]
    struct ScriptedPage {
        payloads: Mutex<VecDeque<Option<serde_json::Value>>>,
        /// URL of each load and how many responses the spy held when it started
        loads: Mutex<Vec<(String, usize)>>,
    }

    impl ScriptedPage {
        fn new(payloads: Vec<Option<serde_json::Value>>) -> Self {
            Self {
                payloads: Mutex::new(payloads.into()),
                loads: Mutex::default(),
            }
        }

        fn loads(&self) -> Vec<(String, usize)> {
            self.loads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageCapture for ScriptedPage {
        async fn capture(
            &self,
            url: &str,
            spy: &mut NetworkSpy,
            _wait: &CaptureWait,
        ) -> milescout_browser::Result<()> {
            self.loads
                .lock()
                .unwrap()
                .push((url.to_string(), spy.responses().len()));
            let payload = self.payloads.lock().unwrap().pop_front().flatten();
            if let Some(payload) = payload {
                spy.record_response(
                    ObservedResponse {
                        url: ITINERARY.to_string(),
                        status: 200,
                    },
                    payload.to_string().as_bytes(),
                )?;
            }
            Ok(())
        }
    }

    fn session(payloads: Vec<Option<serde_json::Value>>) -> CaptureSession<ScriptedPage> {
        CaptureSession::with_page(
            ScriptedPage::new(payloads),
            NetworkSpy::for_endpoint(ITINERARY),
            CaptureWait {
                timeout: Duration::from_secs(10),
                selector: None,
            },
        )
    }

    const AWARD: &str = "https://www.aa.com/booking/search?searchType=Award";

    #[tokio::test]
    async fn test_session_clears_spy_between_searches() {
        let mut session = session(vec![
            Some(json!({ "slices": [slice(&["100"])] })),
            Some(json!({ "slices": [slice(&["200"]), slice(&["300"])] })),
        ]);

        let cash = session.search(SEARCH, false).await.expect("cash search");
        let award = session.search(AWARD, false).await.expect("award search");

        assert_eq!(cash.len(), 1);
        let keys: Vec<_> = award.iter().map(|f| f.correlation_key().to_string()).collect();
        assert_eq!(keys, vec!["AA200", "AA300"]);
        assert_eq!(
            session.session.loads(),
            vec![(SEARCH.to_string(), 0), (AWARD.to_string(), 0)]
        );
        assert_eq!(session.spy.responses().len(), 1);
    }

    #[tokio::test]
    async fn test_session_repeats_served_from_cache() {
        let mut session = session(vec![Some(json!({
            "slices": [slice(&["100"]), slice(&["200", "300"])]
        }))]);

        assert_eq!(session.search(SEARCH, false).await.expect("first").len(), 2);
        assert_eq!(session.search(SEARCH, false).await.expect("repeat").len(), 2);
        assert_eq!(session.search(SEARCH, true).await.expect("direct").len(), 1);

        assert_eq!(session.session.loads().len(), 1);
        assert_eq!(session.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_session_empty_capture_is_failure_and_not_cached() {
        let mut session = session(vec![None, Some(json!({ "slices": [slice(&["100"])] }))]);

        let err = session.search(SEARCH, false).await.unwrap_err();
        assert!(matches!(err, ScrapeError::CaptureFailure { ref url } if url == SEARCH));
        assert!(session.cache.is_empty());

        let flights = session.search(SEARCH, false).await.expect("second load");
        assert_eq!(flights.len(), 1);
        assert_eq!(session.session.loads().len(), 2);
    }

    #[test]
    fn test_launch_options_follow_config_and_proxy() {
        let config = AppConfig::default();
        let direct = launch_options(&config, &ProxyChoice::Direct);
        assert!(direct.proxy.is_none());
        assert_eq!(direct.navigation_timeout, Duration::from_secs(30));

        let proxied = launch_options(
            &config,
            &ProxyChoice::Proxy("http://proxy.example:8080".to_string()),
        );
        assert_eq!(proxied.proxy.as_deref(), Some("http://proxy.example:8080"));
        assert!(proxied.fingerprint.is_none());
    }
}
