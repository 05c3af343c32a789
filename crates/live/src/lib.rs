// crates/live/src/lib.rs
//! Live feed plumbing around `agentwatch-core`: event sources, the
//! per-session supervisor, scan control and the multi-session manager.

pub mod config;
pub mod control;
pub mod error;
pub mod jsonl;
pub mod manager;
pub mod metrics;
pub mod source;
pub mod sse;
pub mod supervisor;

pub use config::FeedConfig;
pub use control::{HttpScanControl, ScanControl};
pub use error::{ConfigError, ControlError, SourceError};
pub use jsonl::{JsonlConnector, JsonlSource};
pub use manager::FeedManager;
pub use source::{Connector, EventSource, ResumeMode, ResumePoint};
pub use sse::{SseConnector, SseSource};
pub use supervisor::{FeedState, LiveSnapshot, Supervisor, SupervisorConfig, SupervisorHandle};
