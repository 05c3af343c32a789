// crates/core/src/snapshot.rs
use serde::Serialize;
use std::sync::Arc;
use ts_rs::TS;

use crate::findings::{Finding, SeverityCounts};
use crate::registry::AgentView;
use crate::session::SessionStatus;
use crate::shared_log::SharedLog;
use crate::stats::Stats;
use crate::transcript::TranscriptEntry;

/// Read-only copy of a session, handed to renderers after every event.
///
/// Taking one is cheap: the transcript and findings share their sealed chunks
/// with the live session, and agent views are shared until the agent set
/// changes. Agents are flat, in discovery order, root first; use
/// [`crate::registry::walk`] for a depth-first view.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub status: SessionStatus,
    #[ts(as = "Vec<AgentView>")]
    pub agents: Arc<[AgentView]>,
    #[ts(as = "Vec<TranscriptEntry>")]
    pub transcript: SharedLog<TranscriptEntry>,
    #[ts(as = "Vec<Finding>")]
    pub findings: SharedLog<Finding>,
    pub severity: SeverityCounts,
    pub stats: Stats,
}

impl SessionSnapshot {
    /// Snapshot of a session that has not seen any events yet.
    pub fn empty(id: impl Into<String>) -> Self {
        crate::session::Session::new(id).snapshot()
    }
}
