//! Plain Chromium backend.

use super::{launch_options, CaptureSession, FlightSearchApi};
use crate::error::Result;
use crate::proxy::ProxyChoice;
use crate::response::FlightSearchResponse;
use async_trait::async_trait;
use milescout_browser::CaptureWait;
use milescout_core::AppConfig;
use std::time::Duration;

/// Headless Chromium that returns as soon as the itinerary response has been captured.
pub struct ChromiumSearch {
    inner: CaptureSession,
}

impl ChromiumSearch {
    /// Launch the browser and open the page searches run in.
    pub async fn launch(config: &AppConfig, proxy: &ProxyChoice) -> Result<Self> {
        let wait = CaptureWait {
            timeout: Duration::from_secs(config.browser.capture_timeout_secs),
            selector: None,
        };
        let inner = CaptureSession::open(config, launch_options(config, proxy), wait).await?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl FlightSearchApi for ChromiumSearch {
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
