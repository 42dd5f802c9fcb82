//! Live-channel transports.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use tracing::debug;

use super::sse::{SseDecoder, SseFrame};
use crate::api::ApiClient;
use crate::error::{NotifyError, Result};

/// Frames of one open live channel. Ends or yields an error when the
/// channel drops.
pub type FrameStream = BoxStream<'static, Result<SseFrame>>;

pub const STREAM_PATH: &str = "notifications/stream";

/// Opens live channels for the stream manager.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Whether this environment can open a live channel at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Open a channel, resuming after `last_event_id` when given.
    async fn open(&self, last_event_id: Option<&str>) -> Result<FrameStream>;
}

/// Server-Sent-Events over HTTP.
#[derive(Debug, Clone)]
pub struct HttpEventTransport {
    client: ApiClient,
    path: String,
}

impl HttpEventTransport {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            path: STREAM_PATH.to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

struct BodyState {
    body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    done: bool,
}

#[async_trait]
impl EventTransport for HttpEventTransport {
    async fn open(&self, last_event_id: Option<&str>) -> Result<FrameStream> {
        let mut request = self
            .client
            .stream_request(&self.path)?
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::from_status(status, None));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            return Err(NotifyError::stream(format!(
                "unexpected content type {content_type:?} for event stream"
            )));
        }
        debug!(url = %response.url(), "event stream opened");

        let state = BodyState {
            body: response.bytes_stream().boxed(),
            decoder: SseDecoder::with_last_event_id(last_event_id.map(str::to_string)),
            pending: VecDeque::new(),
            done: false,
        };

        let frames = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(frame) = state.pending.pop_front() {
                    return Some((Ok(frame), state));
                }
                if state.done {
                    return None;
                }
                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        let frames = state.decoder.feed(&chunk);
                        state.pending.extend(frames);
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(NotifyError::from(e)), state));
                    }
                    None => return None,
                }
            }
        });

        Ok(frames.boxed())
    }
}

/// A transport for environments without live-channel support. The stream
/// manager goes straight to polling (or stays disconnected) with it.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTransport;

#[async_trait]
impl EventTransport for UnsupportedTransport {
    fn is_supported(&self) -> bool {
        false
    }

    async fn open(&self, _last_event_id: Option<&str>) -> Result<FrameStream> {
        Err(NotifyError::stream("live channel is not supported"))
    }
}
