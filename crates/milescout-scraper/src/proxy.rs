//! Proxy selection with per-endpoint cooldowns.
//!
//! The pool is the configured proxy list plus a direct connection, which is
//! rotated like any other endpoint. Blocks are held in memory for the life of
//! the process.

use milescout_core::ProxyConfig;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Where a browser session sends its traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProxyChoice {
    /// Connect without a proxy
    Direct,
    /// Route through the proxy at this URL
    Proxy(String),
}

impl ProxyChoice {
    /// Proxy URL to hand to the browser, `None` for a direct connection.
    #[must_use]
    pub fn proxy_url(&self) -> Option<&str> {
        match self {
            Self::Direct => None,
            Self::Proxy(url) => Some(url),
        }
    }
}

impl fmt::Display for ProxyChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Proxy(url) => f.write_str(&milescout_browser::actions::redact_proxy(url)),
        }
    }
}

/// Rotation over proxies that skips endpoints still cooling down.
#[derive(Debug)]
pub struct ProxyRotation {
    pool: Vec<ProxyChoice>,
    blocked_until: HashMap<ProxyChoice, Instant>,
    cooldown: Duration,
}

impl ProxyRotation {
    /// Build the pool from `urls`. With `prefer_direct` the direct connection
    /// is tried first, otherwise last.
    #[must_use]
    pub fn new(urls: &[String], prefer_direct: bool, cooldown: Duration) -> Self {
        let proxies = urls.iter().cloned().map(ProxyChoice::Proxy);
        let pool = if prefer_direct {
            std::iter::once(ProxyChoice::Direct).chain(proxies).collect()
        } else {
            proxies.chain(std::iter::once(ProxyChoice::Direct)).collect()
        };

        Self {
            pool,
            blocked_until: HashMap::new(),
            cooldown,
        }
    }

    /// Pool and cooldown as configured.
    #[must_use]
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            &config.urls,
            config.prefer_no_proxy,
            Duration::from_secs(config.cooldown_secs),
        )
    }

    /// First endpoint in pool order that is not blocked.
    ///
    /// Expired blocks are dropped as they are encountered. Returns `None`
    /// when every endpoint, direct included, is cooling down.
    pub fn select(&mut self) -> Option<ProxyChoice> {
        let now = Instant::now();
        for candidate in &self.pool {
            match self.blocked_until.get(candidate) {
                None => {
                    info!("Found unblocked proxy: {}", candidate);
                    return Some(candidate.clone());
                }
                Some(until) if now >= *until => {
                    self.blocked_until.remove(candidate);
                    info!("Unblocking proxy: {}", candidate);
                    return Some(candidate.clone());
                }
                Some(_) => {}
            }
        }
        None
    }

    /// The endpoint whose block expires first, for when [`Self::select`] finds nothing.
    #[must_use]
    pub fn soonest_available(&self) -> Option<ProxyChoice> {
        self.pool
            .iter()
            .min_by_key(|choice| self.blocked_until.get(*choice).copied())
            .cloned()
    }

    /// Block `choice` for the default cooldown.
    pub fn block(&mut self, choice: &ProxyChoice) {
        self.block_for(choice, self.cooldown);
    }

    /// Block `choice` for `duration`, replacing any existing block.
    pub fn block_for(&mut self, choice: &ProxyChoice, duration: Duration) {
        self.blocked_until
            .insert(choice.clone(), Instant::now() + duration);
    }

    /// Whether `choice` currently has an unexpired block.
    #[must_use]
    pub fn is_blocked(&self, choice: &ProxyChoice) -> bool {
        self.blocked_until
            .get(choice)
            .is_some_and(|until| Instant::now() < *until)
    }

    /// Default block duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
