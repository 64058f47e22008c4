use milescout_browser::BrowserError;
use milescout_core::MoneyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("no matching network response captured for {url}")]
    CaptureFailure { url: String },

    #[error("{0}")]
    Money(#[from] MoneyError),

    #[error("browser session failed: {0}")]
    BackendSession(#[from] BrowserError),

    #[error("unexpected search response: {0}")]
    ResponseFormat(String),

    #[error("every proxy, including a direct connection, is cooling down")]
    NoProxyAvailable,

    #[error("all {attempts} attempts failed, last error: {last}")]
    ExhaustedRetries {
        attempts: u32,
        last: Box<ScrapeError>,
    },
}

impl ScrapeError {
    /// Whether another attempt (on a different proxy) could succeed.
    ///
    /// Currency errors come from the data itself and fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::CaptureFailure { .. }
            | Self::BackendSession(_)
            | Self::ResponseFormat(_)
            | Self::NoProxyAvailable => true,
            Self::Money(_) | Self::ExhaustedRetries { .. } => false,
        }
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
