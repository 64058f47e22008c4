//! Milescout Core - Foundation crate for the milescout fare scraper.
//!
//! This crate provides the value types, error handling and configuration
//! management that the browser and scraper crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`money`] - Currency-tagged amounts with same-currency checks
//! - [`types`] - Shared newtypes and enums (`AirportCode`, `FareClass`, `PaymentMode`, `TravelDate`)
//!
//! # Example
//!
//! ```rust
//! use milescout_core::{AppConfig, Money};
//! use rust_decimal::Decimal;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.retry.max_attempts, 3);
//!
//! let price = Money::new(Decimal::from(100), "USD");
//! let tax = Money::new(Decimal::from(20), "USD");
//! assert_eq!(price.checked_sub(&tax)?.amount, Decimal::from(80));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod money;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BackendKind, BrowserConfig, ProxyConfig, ReportConfig, RetryConfig, SiteConfig,
};
pub use error::{ConfigError, ConfigResult, MilescoutError, MoneyError, Result};
pub use money::{CurrencyCode, Money};
pub use types::{AirportCode, FareClass, PaymentMode, TravelDate};
