//! Predicate-filtered retention of network exchanges.
//!
//! A [`NetworkSpy`] sees every request and response a page produces and keeps
//! only the ones that satisfy all of its predicates. It has no knowledge of
//! the browser; [`crate::tap::PageTap`] feeds it from a live page.
//!
//! Captures are additive across navigations on the same page, so callers
//! must [`NetworkSpy::clear`] before each logical search.

use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An outgoing request as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRequest {
    pub url: String,
    pub method: String,
    pub post_data: Option<String>,
}

/// Response metadata, available before the body has finished streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedResponse {
    pub url: String,
    pub status: u16,
}

/// A retained request. `body` is set when the post data was JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiedRequest {
    pub url: String,
    pub method: String,
    pub body: Option<serde_json::Value>,
}

/// A retained response with its fully buffered JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiedResponse {
    pub url: String,
    pub status: u16,
    pub json_payload: serde_json::Value,
}

pub type RequestPredicate = Box<dyn Fn(&ObservedRequest) -> bool + Send + Sync>;
pub type ResponsePredicate = Box<dyn Fn(&ObservedResponse) -> bool + Send + Sync>;

/// Buffer of matching network exchanges for one page session.
#[derive(Default)]
pub struct NetworkSpy {
    request_predicates: Vec<RequestPredicate>,
    response_predicates: Vec<ResponsePredicate>,
    requests: Vec<SpiedRequest>,
    responses: Vec<SpiedResponse>,
}

impl NetworkSpy {
    /// Spy that retains everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spy that retains only exchanges with `endpoint`.
    pub fn for_endpoint(endpoint: &str) -> Self {
        let request_target = endpoint.to_string();
        let response_target = endpoint.to_string();
        Self::new()
            .with_request_predicate(move |req| matches_endpoint(&request_target, &req.url))
            .with_response_predicate(move |res| matches_endpoint(&response_target, &res.url))
    }

    /// Add a request predicate. All predicates must hold for a request to be kept.
    #[must_use]
    pub fn with_request_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ObservedRequest) -> bool + Send + Sync + 'static,
    {
        self.request_predicates.push(Box::new(predicate));
        self
    }

    /// Add a response predicate. All predicates must hold for a response to be kept.
    #[must_use]
    pub fn with_response_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ObservedResponse) -> bool + Send + Sync + 'static,
    {
        self.response_predicates.push(Box::new(predicate));
        self
    }

    /// Offer a request to the spy. Returns whether it was retained.
    pub fn observe_request(&mut self, request: &ObservedRequest) -> bool {
        if !self.request_predicates.iter().all(|p| p(request)) {
            debug!(
                "Request url {}, method {} has been skipped",
                request.url, request.method
            );
            return false;
        }

        let body = request
            .post_data
            .as_deref()
            .and_then(|data| serde_json::from_str(data).ok());

        self.requests.push(SpiedRequest {
            url: request.url.clone(),
            method: request.method.clone(),
            body,
        });
        true
    }

    /// Whether a response should have its body fetched and recorded.
    pub fn accepts_response(&self, response: &ObservedResponse) -> bool {
        self.response_predicates.iter().all(|p| p(response))
    }

    /// Record a response once its body has been fully received.
    ///
    /// Responses are appended in the order their bodies complete. Returns
    /// `Ok(false)` without retaining anything when the predicates reject it.
    pub fn record_response(&mut self, response: ObservedResponse, body: &[u8]) -> Result<bool> {
        if !self.accepts_response(&response) {
            debug!(
                "Response url {}, status {} has been skipped",
                response.url, response.status
            );
            return Ok(false);
        }

        let json_payload =
            serde_json::from_slice(body).map_err(|e| BrowserError::BodyDecode {
                url: response.url.clone(),
                reason: e.to_string(),
            })?;

        self.responses.push(SpiedResponse {
            url: response.url,
            status: response.status,
            json_payload,
        });
        Ok(true)
    }

    pub fn requests(&self) -> &[SpiedRequest] {
        &self.requests
    }

    pub fn responses(&self) -> &[SpiedResponse] {
        &self.responses
    }

    pub fn has_captured_response(&self) -> bool {
        !self.responses.is_empty()
    }

    /// Drop every retained exchange. Predicates are kept.
    pub fn clear(&mut self) {
        self.requests.clear();
        self.responses.clear();
    }

    /// Dump retained exchanges at debug level.
    pub fn log_captured(&self) {
        debug!("############# Network requests #############");
        for req in &self.requests {
            debug!(url = %req.url, method = %req.method, has_body = req.body.is_some(), "spied request");
        }

        debug!("############# Network responses #############");
        for res in &self.responses {
            debug!(url = %res.url, status = res.status, "spied response");
        }
    }
}

/// Whether `candidate` addresses the same endpoint as `target`.
///
/// Scheme, host, port and path must agree; query strings and fragments are
/// ignored. Unparseable URLs fall back to exact string comparison.
pub fn matches_endpoint(target: &str, candidate: &str) -> bool {
    match (url::Url::parse(target), url::Url::parse(candidate)) {
        (Ok(t), Ok(c)) => {
            t.scheme() == c.scheme()
                && t.host_str() == c.host_str()
                && t.port_or_known_default() == c.port_or_known_default()
                && t.path().trim_end_matches('/') == c.path().trim_end_matches('/')
        }
        _ => target == candidate,
    }
}
