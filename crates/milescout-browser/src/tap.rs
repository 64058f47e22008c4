//! Feeds CDP network events from a live page into a [`NetworkSpy`].
//!
//! A tap subscribes to the page's network events on [`PageTap::attach`] and
//! unsubscribes when detached or dropped. Events are handed to the spy on the
//! caller's task: response bodies are fetched inline, so a response is
//! appended only once its body has completed.

use crate::error::Result;
use crate::spy::{NetworkSpy, ObservedRequest, ObservedResponse};
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, Request, RequestId,
};
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One network event relevant to capture.
#[derive(Debug)]
pub enum TapEvent {
    Request(ObservedRequest),
    Response(String, ObservedResponse),
    Finished(String),
    Failed(String),
}

/// Pairs accepted responses with the end of their body, by request id.
///
/// Response headers and loading completion normally arrive in that order,
/// but either may be seen first. A response becomes ready once both halves
/// have been seen.
#[derive(Debug, Default)]
pub struct PendingBodies {
    awaiting_body: HashMap<String, ObservedResponse>,
    finished_early: HashSet<String>,
}

impl PendingBodies {
    pub fn new() -> Self {
        Self::default()
    }

    /// An accepted response's headers arrived. Returns it when its body had already completed.
    pub fn response(
        &mut self,
        request_id: String,
        response: ObservedResponse,
    ) -> Option<(String, ObservedResponse)> {
        if self.finished_early.remove(&request_id) {
            Some((request_id, response))
        } else {
            self.awaiting_body.insert(request_id, response);
            None
        }
    }

    /// A response was rejected; nothing will wait on its body.
    pub fn skip(&mut self, request_id: &str) {
        self.finished_early.remove(request_id);
    }

    /// A body completed. Returns the accepted response it belongs to, if already seen.
    pub fn finished(&mut self, request_id: String) -> Option<(String, ObservedResponse)> {
        match self.awaiting_body.remove(&request_id) {
            Some(response) => Some((request_id, response)),
            None => {
                self.finished_early.insert(request_id);
                None
            }
        }
    }

    /// Loading failed. Returns the accepted response that will never complete, if any.
    pub fn failed(&mut self, request_id: &str) -> Option<ObservedResponse> {
        self.finished_early.remove(request_id);
        self.awaiting_body.remove(request_id)
    }

    /// Accepted responses still waiting for their body.
    pub fn len(&self) -> usize {
        self.awaiting_body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.awaiting_body.is_empty()
    }
}

/// Request body as text, joined from the base64 post data entries.
///
/// `None` when there are no entries or the bytes are not valid base64 UTF-8.
pub fn decode_post_data<'a, I>(entries: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut bytes = Vec::new();
    let mut any = false;
    for entry in entries {
        any = true;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(entry.as_bytes())
            .ok()?;
        bytes.extend_from_slice(&decoded);
    }
    if !any {
        return None;
    }
    String::from_utf8(bytes).ok()
}

fn request_post_data(request: &Request) -> Option<String> {
    let entries = request.post_data_entries.as_deref()?;
    decode_post_data(entries.iter().filter_map(|entry| {
        entry.bytes.as_ref().map(|bytes| {
            let encoded: &str = bytes.as_ref();
            encoded
        })
    }))
}

/// Subscription to one page's network events.
pub struct PageTap {
    page: Page,
    requests: EventStream<EventRequestWillBeSent>,
    responses: EventStream<EventResponseReceived>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
    pending: PendingBodies,
}

impl PageTap {
    /// Subscribe to request, response and loading events on `page`.
    pub async fn attach(page: &Page) -> Result<Self> {
        Ok(Self {
            page: page.clone(),
            requests: page.event_listener::<EventRequestWillBeSent>().await?,
            responses: page.event_listener::<EventResponseReceived>().await?,
            finished: page.event_listener::<EventLoadingFinished>().await?,
            failed: page.event_listener::<EventLoadingFailed>().await?,
            pending: PendingBodies::new(),
        })
    }

    /// Wait for the next network event. `None` once every stream has closed.
    ///
    /// Streams are polled in the order CDP emits events for one request, so
    /// buffered headers are delivered before the matching completion.
    pub async fn next_event(&mut self) -> Option<TapEvent> {
        tokio::select! {
            biased;
            Some(ev) = self.requests.next() => Some(TapEvent::Request(ObservedRequest {
                url: ev.request.url.clone(),
                method: ev.request.method.clone(),
                post_data: request_post_data(&ev.request),
            })),
            Some(ev) = self.responses.next() => Some(TapEvent::Response(
                ev.request_id.inner().clone(),
                ObservedResponse {
                    url: ev.response.url.clone(),
                    status: u16::try_from(ev.response.status).unwrap_or_default(),
                },
            )),
            Some(ev) = self.finished.next() => Some(TapEvent::Finished(ev.request_id.inner().clone())),
            Some(ev) = self.failed.next() => Some(TapEvent::Failed(ev.request_id.inner().clone())),
            else => None,
        }
    }

    /// Apply one event to the spy.
    ///
    /// Response bodies that are not JSON are logged and dropped; the caller
    /// sees the absence of a capture rather than an error.
    pub async fn feed(&mut self, event: TapEvent, spy: &mut NetworkSpy) -> Result<()> {
        match event {
            TapEvent::Request(request) => {
                spy.observe_request(&request);
            }
            TapEvent::Response(request_id, response) => {
                if spy.accepts_response(&response) {
                    if let Some(ready) = self.pending.response(request_id, response) {
                        self.record(ready, spy).await?;
                    }
                } else {
                    self.pending.skip(&request_id);
                    debug!(
                        "Response url {}, status {} has been skipped",
                        response.url, response.status
                    );
                }
            }
            TapEvent::Finished(request_id) => {
                if let Some(ready) = self.pending.finished(request_id) {
                    self.record(ready, spy).await?;
                }
            }
            TapEvent::Failed(request_id) => {
                if let Some(response) = self.pending.failed(&request_id) {
                    warn!("Loading failed for captured response {}", response.url);
                }
            }
        }
        Ok(())
    }

    async fn record(
        &self,
        (request_id, response): (String, ObservedResponse),
        spy: &mut NetworkSpy,
    ) -> Result<()> {
        let body = self.response_body(request_id).await?;
        if let Err(e) = spy.record_response(response, &body) {
            warn!("Discarding captured response: {}", e);
        }
        Ok(())
    }

    async fn response_body(&self, request_id: String) -> Result<Vec<u8>> {
        let reply = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await?;

        if reply.result.base64_encoded {
            base64::engine::general_purpose::STANDARD
                .decode(reply.result.body.as_bytes())
                .map_err(|e| crate::error::BrowserError::ChromiumError(e.to_string()))
        } else {
            Ok(reply.result.body.clone().into_bytes())
        }
    }

    /// Stop listening. Returns the number of accepted responses whose bodies never completed.
    pub fn detach(self) -> usize {
        self.pending.len()
    }
}
