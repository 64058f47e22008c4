//! Whole-operation retry tied to proxy health.
//!
//! Every attempt draws a proxy from the rotation. A retryable failure blocks
//! that proxy and, unless attempts are exhausted, waits out an exponential
//! backoff before the next draw. When every endpoint is cooling down the
//! attempt still runs, on the endpoint whose block ends first.

use crate::error::{Result, ScrapeError};
use crate::proxy::{ProxyChoice, ProxyRotation};
use milescout_core::{AppConfig, RetryConfig};
use std::future::Future;
use std::time::Duration;

/// Attempt cap and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            multiplier: Duration::from_secs(config.backoff_multiplier_secs),
            min_backoff: Duration::from_secs(config.min_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }

    /// Wait after the `failed_attempt`-th attempt (1-based) fails:
    /// `multiplier * 2^(n-1)`, clamped to `[min_backoff, max_backoff]`.
    #[must_use]
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1 << exponent);
        raw.clamp(self.min_backoff, self.max_backoff.max(self.min_backoff))
    }
}

/// Runs an operation until it succeeds on some proxy or attempts run out.
#[derive(Debug)]
pub struct RetryCoordinator {
    rotation: ProxyRotation,
    policy: RetryPolicy,
}

impl RetryCoordinator {
    #[must_use]
    pub fn new(rotation: ProxyRotation, policy: RetryPolicy) -> Self {
        Self { rotation, policy }
    }

    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ProxyRotation::from_config(&config.proxy),
            RetryPolicy::from_config(&config.retry),
        )
    }

    #[must_use]
    pub fn rotation(&self) -> &ProxyRotation {
        &self.rotation
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` with a freshly selected proxy per attempt.
    ///
    /// Non-retryable errors are returned immediately and leave the proxy
    /// unblocked. After the last attempt fails the caller receives
    /// [`ScrapeError::ExhaustedRetries`] wrapping the final error.
    pub async fn run_with_retries<T, F, Fut>(&mut self, mut operation: F) -> Result<T>
    where
        F: FnMut(ProxyChoice) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let choice = match self.rotation.select() {
                Some(choice) => choice,
                None => {
                    let fallback = self
                        .rotation
                        .soonest_available()
                        .unwrap_or(ProxyChoice::Direct);
                    tracing::warn!(
                        "No proxy available (attempt {}/{}), trying {} anyway",
                        attempt,
                        max_attempts,
                        fallback
                    );
                    fallback
                }
            };

            match operation(choice.clone()).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, proxy = %choice, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!("Non-retryable error with proxy {}: {}", choice, e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(
                        "Error during analysis with proxy {} (attempt {}/{}): {}",
                        choice,
                        attempt,
                        max_attempts,
                        e
                    );
                    self.rotation.block(&choice);
                    last_error = Some(e);
                }
            }

            if attempt < max_attempts {
                let delay = self.policy.backoff(attempt);
                tracing::warn!("Retrying in {:?}...", delay);
                tokio::time::sleep(delay).await;
            }
        }

        let last_error = last_error.unwrap_or(ScrapeError::NoProxyAvailable);
        tracing::error!("All retries failed: {}", last_error);
        Err(ScrapeError::ExhaustedRetries {
            attempts: max_attempts,
            last: Box::new(last_error),
        })
    }
}
