// crates/core/src/lib.rs
//! Live agent-session aggregation.
//!
//! Raw feed records go through [`event::decode`], then [`session::Session::apply`]
//! folds them into a session whose [`snapshot::SessionSnapshot`] is handed to
//! renderers. Everything in this crate is synchronous and free of I/O.

pub mod display;
pub mod event;
pub mod findings;
pub mod registry;
pub mod session;
pub mod shared_log;
pub mod snapshot;
pub mod stats;
pub mod transcript;

pub use event::{decode, decode_at, DecodeError, Event, EventKind, TerminalStatus};
pub use findings::{Finding, FindingsCollector, Severity, SeverityCounts};
pub use registry::{walk, Agent, AgentRegistry, AgentStatus, AgentView, Registration, ROOT_AGENT_ID};
pub use session::{reduce, Session, SessionStatus, Transition};
pub use shared_log::SharedLog;
pub use snapshot::SessionSnapshot;
pub use stats::{MicroUsd, Stats, StatsSnapshot};
pub use transcript::{EntryBody, TranscriptEntry, TranscriptLog};
