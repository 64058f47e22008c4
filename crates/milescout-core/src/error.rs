//! Core error types for milescout.
//!
//! This module defines the central error type used by the foundation types
//! plus the configuration and money errors that other crates wrap.

use thiserror::Error;

/// Central error type for core operations.
#[derive(Error, Debug)]
pub enum MilescoutError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Money errors (currency mismatch, conversion)
    #[error("money error: {0}")]
    Money(#[from] MoneyError),

    /// Validation errors (invalid input, constraints)
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Errors raised when combining or reporting [`crate::Money`] values.
///
/// Neither variant is transient: retrying the same computation yields the
/// same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Two amounts in different currencies were combined or compared
    #[error("money operations require the same currency: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency of the left-hand operand
        left: String,
        /// Currency of the right-hand operand
        right: String,
    },

    /// An amount was requested in a currency other than its own
    #[error("currency conversion not implemented: {from} -> {to}")]
    UnsupportedConversion {
        /// Currency the amount is held in
        from: String,
        /// Currency that was requested
        to: String,
    },
}

/// Result type alias using `MilescoutError`.
pub type Result<T> = std::result::Result<T, MilescoutError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MilescoutError::Validation("bad airport".to_string());
        assert_eq!(err.to_string(), "validation error: bad airport");

        let err = ConfigError::NoConfigDir;
        assert_eq!(
            err.to_string(),
            "could not determine config directory (XDG base directories not available)"
        );
    }

    #[test]
    fn test_money_error_display() {
        let err = MoneyError::CurrencyMismatch {
            left: "USD".to_string(),
            right: "EUR".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "money operations require the same currency: USD vs EUR"
        );
    }

    #[test]
    fn test_error_from_config() {
        let config_err = ConfigError::NoConfigDir;
        let err: MilescoutError = config_err.into();
        assert!(matches!(err, MilescoutError::Config(_)));
    }

    #[test]
    fn test_error_from_money() {
        let money_err = MoneyError::UnsupportedConversion {
            from: "EUR".to_string(),
            to: "USD".to_string(),
        };
        let err: MilescoutError = money_err.into();
        assert!(matches!(err, MilescoutError::Money(_)));
    }
}
