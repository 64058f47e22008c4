//! Milescout Scraper - resilient acquisition and correlation of fare data.
//!
//! This crate drives flight searches on the airline's booking site through a
//! browser backend, captures the itinerary API responses those searches
//! trigger, and fuses the schedule, cash fare and award price of each flight
//! into one record with a cents-per-point valuation.
//!
//! # Features
//!
//! - Proxy rotation with per-endpoint cooldowns, direct connection included
//! - Whole-run retry with exponential backoff that blocks failing proxies
//! - Two interchangeable browser backends behind [`FlightSearchApi`]
//! - Strict-intersection join of timing, cash and miles results
//!
//! # Example
//!
//! ```rust,ignore
//! use milescout_core::AppConfig;
//! use milescout_scraper::{connect_backend, scrape_with_retries, RetryCoordinator};
//!
//! let config = AppConfig::load()?;
//! let mut coordinator = RetryCoordinator::from_config(&config);
//! let flights = scrape_with_retries(
//!     &mut coordinator,
//!     &query,
//!     &config.site.search_url(),
//!     |proxy| {
//!         let config = config.clone();
//!         async move { connect_backend(&config, &proxy).await }
//!     },
//! )
//! .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod flight;
pub mod orchestrator;
pub mod proxy;
#[allow(missing_docs)]
pub mod report;
#[allow(missing_docs)]
pub mod response;
#[allow(missing_docs)]
pub mod retry;
pub mod search;
#[allow(missing_docs)]
pub mod url_builder;

// Re-export commonly used types
pub use error::{Result, ScrapeError};
pub use flight::{
    FlightCashPrice, FlightKey, FlightMilesPrice, FlightTiming, FlightTimingAndPrices,
};
pub use orchestrator::{merge_flights, scrape_with_retries, FlightScraper, SearchQuery};
pub use proxy::{ProxyChoice, ProxyRotation};
pub use report::{FlightReport, SearchMetadata, SearchReport};
pub use response::FlightSearchResponse;
pub use retry::{RetryCoordinator, RetryPolicy};
pub use search::{connect_backend, ChromiumSearch, FlightSearchApi, SearchCache, StealthSearch};
pub use url_builder::FlightSearchRequest;
