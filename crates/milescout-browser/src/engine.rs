use crate::actions::{extract_domain, redact_proxy, BrowserActions};
use crate::error::{BrowserError, Result};
use crate::fingerprint::{FingerprintConfig, STEALTH_SCRIPT};
use crate::spy::NetworkSpy;
use crate::tap::{PageTap, TapEvent};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between selector checks while waiting for an element.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How a browser is launched.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Proxy server URL; `None` connects directly
    pub proxy: Option<String>,
    pub chrome_executable: Option<PathBuf>,
    /// Randomized identity applied to every page, if any
    pub fingerprint: Option<FingerprintConfig>,
    pub navigation_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 720,
            proxy: None,
            chrome_executable: None,
            fingerprint: None,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

/// When a capture is complete.
#[derive(Debug, Clone)]
pub struct CaptureWait {
    /// Upper bound on waiting for a matching response after navigation starts
    pub timeout: Duration,
    /// Selector that must render after navigation; absence is logged, not fatal
    pub selector: Option<String>,
}

/// Browser automation engine
pub struct BrowserEngine {
    browser: Browser,
    handler: JoinHandle<()>,
    options: LaunchOptions,
}

impl BrowserEngine {
    /// Launch a browser with the given options
    pub async fn launch(options: LaunchOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(options.window_width, options.window_height)
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        if let Some(fingerprint) = &options.fingerprint {
            builder = builder.args(fingerprint.launch_args());
        }

        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Drive the CDP connection until the browser closes
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        info!(
            proxy = %options.proxy.as_deref().map_or_else(|| "none".to_string(), redact_proxy),
            headless = options.headless,
            "launched browser"
        );

        Ok(Self {
            browser,
            handler,
            options,
        })
    }

    /// Open a new page, applying the configured fingerprint.
    pub async fn new_session(&self) -> Result<BrowserSession> {
        let page = self.browser.new_page("about:blank").await?;

        if let Some(fingerprint) = &self.options.fingerprint {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
                .await?;
            if let Err(e) = page
                .execute(SetTimezoneOverrideParams::new(fingerprint.timezone.clone()))
                .await
            {
                warn!("Could not override timezone: {}", e);
            }
        }

        Ok(BrowserSession {
            page,
            navigation_timeout: self.options.navigation_timeout,
        })
    }

    /// Close the browser and stop its event handler.
    pub async fn close(mut self) -> Result<()> {
        let result = self.browser.close().await;
        self.handler.abort();
        result.map(|_| ()).map_err(BrowserError::from)
    }
}

/// One page (tab) in a launched browser.
pub struct BrowserSession {
    page: Page,
    navigation_timeout: Duration,
}

enum CaptureStep {
    Navigated(Result<()>),
    Event(Option<TapEvent>),
    TimedOut,
}

impl BrowserSession {
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Navigate to `url` while feeding the page's network traffic into `spy`.
    ///
    /// Returns once navigation has finished and the spy holds at least one
    /// response, or when `wait.timeout` elapses after navigation. Having
    /// captured nothing is not an error here; callers decide what an empty
    /// capture means.
    pub async fn capture(&self, url: &str, spy: &mut NetworkSpy, wait: &CaptureWait) -> Result<()> {
        let mut tap = PageTap::attach(&self.page).await?;
        let mut navigation = self.navigate(url);
        // Navigation is bounded by its own timeout; the capture window starts once it is done.
        let deadline = tokio::time::sleep(self.navigation_timeout + wait.timeout);
        tokio::pin!(deadline);
        let mut navigated = false;

        let outcome = loop {
            if navigated && spy.has_captured_response() {
                break Ok(());
            }

            let step = tokio::select! {
                res = &mut navigation, if !navigated => CaptureStep::Navigated(res),
                event = tap.next_event() => CaptureStep::Event(event),
                () = &mut deadline => CaptureStep::TimedOut,
            };

            match step {
                CaptureStep::Navigated(Ok(())) => {
                    navigated = true;
                    deadline.as_mut().reset(Instant::now() + wait.timeout);
                }
                CaptureStep::Navigated(Err(e)) => break Err(e),
                CaptureStep::Event(Some(event)) => {
                    if let Err(e) = tap.feed(event, spy).await {
                        break Err(e);
                    }
                }
                CaptureStep::Event(None) => {
                    break Err(BrowserError::ChromiumError(
                        "page event streams closed".to_string(),
                    ))
                }
                CaptureStep::TimedOut => {
                    if capture_settled(navigated, spy.has_captured_response()) {
                        break Ok(());
                    }
                    break Err(BrowserError::Timeout(format!(
                        "no response from {url} within {:?}",
                        wait.timeout
                    )));
                }
            }
        };

        let unfinished = tap.detach();
        if unfinished > 0 {
            debug!(unfinished, "detached with response bodies still streaming");
        }
        outcome?;

        if let Some(selector) = &wait.selector {
            if let Err(e) = self.wait_for_selector(selector, wait.timeout).await {
                warn!("Results did not render: {}", e);
            }
        }

        Ok(())
    }
}

/// Whether a capture that hit its deadline still counts as complete.
///
/// A page that never finished navigating is only a timeout when nothing
/// matching was captured along the way.
fn capture_settled(navigated: bool, captured: bool) -> bool {
    navigated || captured
}

#[async_trait::async_trait]
impl BrowserActions for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!(domain = %extract_domain(url).unwrap_or_default(), "navigating");

        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationError(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} exceeded {:?}",
                self.navigation_timeout
            ))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(BrowserError::SelectorNotFound(selector.to_string()));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }
}
