//! Milescout command-line shell
//!
//! Parses arguments, loads configuration and hands the search to the scraper.
//! Core logic lives in the `crates/` directory.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use milescout_core::{AirportCode, AppConfig, BackendKind, FareClass, TravelDate};
use milescout_scraper::{
    connect_backend, scrape_with_retries, RetryCoordinator, SearchQuery, SearchReport,
};
use std::path::{Path, PathBuf};
use tracing::info;

/// Cabins a search can be priced in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CabinClass {
    Coach,
    PremiumEconomy,
    Business,
    First,
}

impl From<CabinClass> for FareClass {
    fn from(cabin: CabinClass) -> Self {
        match cabin {
            CabinClass::Coach => FareClass::Coach,
            CabinClass::PremiumEconomy => FareClass::PremiumEconomy,
            CabinClass::Business => FareClass::Business,
            CabinClass::First => FareClass::First,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "milescout",
    about = "Compare cash fares with award prices and compute cents per point",
    version
)]
pub struct Args {
    /// Departure airport code (e.g. DFW).
    #[arg(short, long)]
    pub origin: String,

    /// Arrival airport code (e.g. LAX).
    #[arg(short, long)]
    pub destination: String,

    /// Travel date, YYYY-MM-DD.
    #[arg(long)]
    pub date: String,

    /// Number of adult passengers.
    #[arg(short, long, default_value_t = 1)]
    pub passengers: u32,

    /// Fare class to price.
    #[arg(short, long, value_enum, default_value_t = CabinClass::Coach)]
    pub cabin_class: CabinClass,

    /// Write the JSON report here instead of logging it.
    #[arg(short = 'f', long)]
    pub output_file_path: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long)]
    pub debug: bool,

    /// Only consider non-stop flights.
    #[arg(long)]
    pub direct_only: bool,

    /// Use the fingerprinted browser backend.
    #[arg(long)]
    pub use_stealth_browser: bool,

    /// Configuration file (defaults to the platform config directory).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Validated search query.
    pub fn query(&self) -> anyhow::Result<SearchQuery> {
        Ok(SearchQuery {
            origin: self
                .origin
                .parse::<AirportCode>()
                .context("invalid --origin")?,
            destination: self
                .destination
                .parse::<AirportCode>()
                .context("invalid --destination")?,
            date: self.date.parse::<TravelDate>().context("invalid --date")?,
            passengers: self.passengers.max(1),
            fare_class: self.cabin_class.into(),
            direct_only: self.direct_only,
        })
    }

    /// Configuration with environment overrides and command-line switches applied.
    pub fn config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load_with_env(self.config.as_deref())
            .context("Failed to load configuration")?;
        if self.use_stealth_browser {
            config.browser.backend = BackendKind::Stealth;
        }
        Ok(config)
    }
}

/// Initialize tracing subscriber for logging
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default_filter = if debug { "info,milescout=debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Run one analysis and emit its report.
pub async fn run(args: Args) -> anyhow::Result<()> {
    info!("Starting milescout v{}", env!("CARGO_PKG_VERSION"));

    let query = args.query()?;
    let config = args.config()?;
    info!(
        proxies = config.proxy.urls.len(),
        backend = %config.browser.backend,
        "Loaded configuration"
    );

    let mut coordinator = RetryCoordinator::from_config(&config);
    let search_url = config.site.search_url();
    let flights = scrape_with_retries(&mut coordinator, &query, &search_url, |proxy| {
        let config = config.clone();
        async move { connect_backend(&config, &proxy).await }
    })
    .await
    .context("Flight analysis failed")?;

    let report = SearchReport::build(&query, &flights, &config.report.expected_currency)
        .context("Failed to build report")?;
    emit_report(&report, args.output_file_path.as_deref())
}

/// Write the report to `path`, or log it when no path is given.
pub fn emit_report(report: &SearchReport, path: Option<&Path>) -> anyhow::Result<()> {
    let json = report
        .to_json_pretty()
        .context("Failed to serialize report")?;
    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Results saved to {}", path.display());
        }
        None => {
            info!("##### SCRAPER RESULTS #####");
            info!("\n{}", json);
            info!("##### SCRAPER RESULTS #####");
        }
    }
    Ok(())
}
