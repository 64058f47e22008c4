//! Fingerprinted Chromium backend that behaves more like a returning visitor.

use super::{launch_options, CaptureSession, FlightSearchApi};
use crate::error::Result;
use crate::proxy::ProxyChoice;
use crate::response::FlightSearchResponse;
use async_trait::async_trait;
use milescout_browser::{CaptureWait, FingerprintConfig};
use milescout_core::AppConfig;
use std::time::Duration;
use tracing::info;

/// Chromium with a randomized identity.
///
/// The session visits the homepage before its first search and waits for
/// the result grid to render after each search page load.
pub struct StealthSearch {
    inner: CaptureSession,
}

impl StealthSearch {
    /// Launch with a fresh fingerprint and warm the session up on the homepage.
    pub async fn launch(config: &AppConfig, proxy: &ProxyChoice) -> Result<Self> {
        let fingerprint = FingerprintConfig::randomized();
        info!(user_agent = %fingerprint.user_agent, "Using randomized fingerprint");

        let mut options = launch_options(config, proxy);
        options.window_width = fingerprint.viewport_width;
        options.window_height = fingerprint.viewport_height;
        options.fingerprint = Some(fingerprint);

        let timeout = Duration::from_secs(config.browser.capture_timeout_secs);
        let wait = CaptureWait {
            timeout,
            selector: Some(config.site.results_selector.clone()),
        };

        let inner = CaptureSession::open(config, options, wait).await?;
        inner
            .warm_up(&config.site.base_url, &config.site.homepage_selector, timeout)
            .await;
        Ok(Self { inner })
    }
}

#[async_trait]
impl FlightSearchApi for StealthSearch {
    async fn search_flight_details(
        &mut self,
        search_url: &str,
        direct_only: bool,
    ) -> Result<Vec<FlightSearchResponse>> {
        self.inner.search(search_url, direct_only).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
