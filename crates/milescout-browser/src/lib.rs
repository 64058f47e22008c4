//! Browser automation for the airline booking site.
//!
//! Provides Chromium sessions (optionally behind a proxy and with a
//! randomized fingerprint) and a network spy that retains the JSON
//! payloads of matching API exchanges while a page loads.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod spy;
pub mod tap;

pub use actions::BrowserActions;
pub use engine::{BrowserEngine, BrowserSession, CaptureWait, LaunchOptions};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
pub use spy::{NetworkSpy, ObservedRequest, ObservedResponse, SpiedRequest, SpiedResponse};
pub use tap::{PageTap, PendingBodies};
