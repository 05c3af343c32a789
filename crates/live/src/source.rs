// crates/live/src/source.rs
//! Event source seam between transports and the supervisor.

use async_trait::async_trait;

use crate::error::SourceError;

/// How a reconnected source positions itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMode {
    /// The source continues after the cursor it was given.
    FromCursor,
    /// The source starts over from the first record.
    Replay,
}

/// Where the supervisor is in the stream when it (re)connects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumePoint {
    /// Cursor of the last record delivered, when records carry one.
    pub cursor: Option<String>,
    /// Records delivered so far on this session.
    pub delivered: u64,
}

/// An open, ordered stream of raw records.
#[async_trait]
pub trait EventSource: Send {
    /// Next raw record. `Ok(None)` means the stream ended cleanly.
    async fn next_record(&mut self) -> Result<Option<String>, SourceError>;

    /// How this connection was positioned. Defaults to a full replay.
    fn resume_mode(&self) -> ResumeMode {
        ResumeMode::Replay
    }
}

/// Opens event sources, once per (re)connect.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, resume: &ResumePoint) -> Result<Box<dyn EventSource>, SourceError>;

    /// Short label for logs ("sse", "jsonl", ...).
    fn name(&self) -> &str;
}
