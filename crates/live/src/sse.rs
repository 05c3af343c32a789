// crates/live/src/sse.rs
//! Server-Sent Events feed source.
//!
//! Opens `GET {base}/api/offensive/scans/{id}/feed` and yields the `data`
//! payload of each SSE event as one raw record. Framing (line endings, BOM,
//! multi-line data, comments) is handled by `eventsource-stream`; events
//! without data are skipped.

use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tracing::{debug, trace};

use crate::error::SourceError;
use crate::source::{Connector, EventSource, ResumeMode, ResumePoint};

type SseEvents = BoxStream<'static, Result<Event, EventStreamError<reqwest::Error>>>;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

pub struct SseSource {
    events: SseEvents,
    mode: ResumeMode,
}

impl SseSource {
    pub fn new(response: reqwest::Response, mode: ResumeMode) -> Self {
        Self {
            events: response.bytes_stream().eventsource().boxed(),
            mode,
        }
    }
}

#[async_trait]
impl EventSource for SseSource {
    async fn next_record(&mut self) -> Result<Option<String>, SourceError> {
        while let Some(next) = self.events.next().await {
            match next {
                Ok(event) if event.data.is_empty() => {
                    trace!(event = %event.event, "SSE event without data skipped");
                }
                Ok(event) => {
                    trace!(event = %event.event, id = %event.id, bytes_len = event.data.len(), "SSE event");
                    return Ok(Some(event.data));
                }
                Err(EventStreamError::Transport(source)) => return Err(SourceError::Transport { source }),
                Err(other) => {
                    return Err(SourceError::Malformed {
                        message: other.to_string(),
                    })
                }
            }
        }
        Ok(None)
    }

    fn resume_mode(&self) -> ResumeMode {
        self.mode
    }
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Connects to a scan's live feed.
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    base_url: String,
    scan_id: String,
    token: Option<String>,
    resume_supported: bool,
}

impl SseConnector {
    pub fn new(base_url: impl Into<String>, scan_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scan_id: scan_id.into(),
            token: None,
            resume_supported: false,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Send `Last-Event-ID` on reconnect and trust the feed to continue after
    /// it.
    pub fn with_resume(mut self, supported: bool) -> Self {
        self.resume_supported = supported;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn feed_url(&self) -> String {
        format!("{}/api/offensive/scans/{}/feed", self.base_url, self.scan_id)
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn connect(&self, resume: &ResumePoint) -> Result<Box<dyn EventSource>, SourceError> {
        let mut request = self
            .client
            .get(self.feed_url())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &self.token {
            request = request.query(&[("token", token)]);
        }

        let mode = match (&resume.cursor, self.resume_supported) {
            (Some(cursor), true) => {
                request = request.header("Last-Event-ID", cursor.as_str());
                ResumeMode::FromCursor
            }
            _ => ResumeMode::Replay,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Rejected {
                status: status.as_u16(),
            });
        }
        debug!(scan_id = %self.scan_id, ?mode, "feed connected");

        Ok(Box::new(SseSource::new(response, mode)))
    }

    fn name(&self) -> &str {
        "sse"
    }
}
