// crates/core/src/session.rs
//! Session state and the reducer that folds events into it.
//!
//! A [`Session`] starts `Running` with only the root agent registered. Each
//! decoded [`Event`] is applied in arrival order. A `complete` event moves the
//! session into a terminal status; from then on every event is logged and
//! ignored without touching state.
//!
//! Applying an event never fails. Records the decoder could not make sense of
//! still produce a (raw) transcript entry, and references to agents that were
//! never announced are logged no-ops.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::event::{id_string, unwrap_json_string, Event, EventKind, ToolUpdate};
use crate::findings::FindingsCollector;
use crate::registry::{AgentRegistry, AgentStatus, AgentView};
use crate::snapshot::SessionSnapshot;
use crate::stats::{self, Stats};
use crate::transcript::{EntryBody, TranscriptLog};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// State changed; the session is still running.
    Applied,
    /// The event ended the session with this status.
    Terminated(SessionStatus),
    /// The session was already terminal; nothing changed.
    Ignored,
}

impl Transition {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Transition::Terminated(_))
    }
}

/// Tool names whose results announce a newly spawned agent.
const AGENT_CREATION_TOOLS: &[&str] = &["create_agent", "spawn_agent", "subagent_start"];

fn is_agent_creation_tool(tool: &str) -> bool {
    AGENT_CREATION_TOOLS.contains(&tool) || tool.contains("create_agent")
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    status: SessionStatus,
    agents: AgentRegistry,
    /// Agent views for snapshots. Reset whenever the registry changes and
    /// rebuilt by the next snapshot.
    agent_views: OnceLock<Arc<[AgentView]>>,
    transcript: TranscriptLog,
    findings: FindingsCollector,
    stats: Stats,
    /// `execution_id -> tool` from tool starts, for updates that omit the name.
    tool_names: HashMap<String, String>,
    /// Last `agents_count` an authoritative snapshot reported.
    reported_agents: Option<u64>,
    first_event_at: Option<DateTime<Utc>>,
    /// Snapshot-provided elapsed time and the instant it was reported at.
    elapsed_anchor: Option<(DateTime<Utc>, u64)>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let agents = AgentRegistry::new();
        let stats = Stats {
            agents_count: agents.len() as u64,
            ..Stats::default()
        };
        Self {
            id: id.into(),
            status: SessionStatus::Running,
            agent_views: OnceLock::new(),
            agents,
            transcript: TranscriptLog::new(),
            findings: FindingsCollector::new(),
            stats,
            tool_names: HashMap::new(),
            reported_agents: None,
            first_event_at: None,
            elapsed_anchor: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn transcript(&self) -> &TranscriptLog {
        &self.transcript
    }

    pub fn findings(&self) -> &FindingsCollector {
        &self.findings
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Immutable copy for renderers. Shares transcript chunks, findings and
    /// agent views with the session instead of copying them.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            status: self.status,
            agents: Arc::clone(self.agent_views.get_or_init(|| self.agents.views().into())),
            transcript: self.transcript.entries().clone(),
            findings: self.findings.all().clone(),
            severity: self.findings.severity_counts(),
            stats: self.stats,
        }
    }

    /// Fold one event into the session.
    pub fn apply(&mut self, event: &Event) -> Transition {
        if self.status.is_terminal() {
            warn!(
                session_id = %self.id,
                status = %self.status,
                kind = event.kind.as_str(),
                "event after terminal state ignored"
            );
            return Transition::Ignored;
        }

        debug!(session_id = %self.id, kind = event.kind.as_str(), cursor = ?event.cursor, "applying event");
        let agent_id = event.agent_id.as_deref();

        let transition = match &event.kind {
            EventKind::ToolStart(start) => {
                if let Some(exec) = &start.execution_id {
                    self.tool_names.insert(exec.clone(), start.tool.clone());
                }
                self.transcript.append(
                    event.timestamp,
                    agent_id,
                    EntryBody::ToolCall {
                        tool: start.tool.clone(),
                        args: start.args.clone(),
                        execution_id: start.execution_id.clone(),
                    },
                );
                self.stats.tools_used = self.stats.tools_used.saturating_add(1);
                Transition::Applied
            }
            EventKind::ToolUpdate(update) => {
                let tool = update.tool.clone().or_else(|| {
                    update
                        .execution_id
                        .as_ref()
                        .and_then(|exec| self.tool_names.get(exec).cloned())
                });
                self.track_agent(update, tool.as_deref());
                self.transcript.append(
                    event.timestamp,
                    agent_id,
                    EntryBody::ToolResult {
                        tool,
                        execution_id: update.execution_id.clone(),
                        status: update.status.clone(),
                        result: update.result.clone(),
                    },
                );
                Transition::Applied
            }
            EventKind::Chat(turn) => {
                self.transcript.append(
                    event.timestamp,
                    agent_id,
                    EntryBody::Chat {
                        role: turn.role,
                        text: turn.text.clone(),
                    },
                );
                Transition::Applied
            }
            EventKind::Vulnerability(report) => {
                let finding = self.findings.record(report, event.timestamp, agent_id);
                self.transcript.append(
                    event.timestamp,
                    agent_id,
                    EntryBody::Finding {
                        finding_id: finding.id.clone(),
                        title: finding.title.clone(),
                        severity: finding.severity,
                    },
                );
                self.stats.vulnerabilities_found = self.stats.vulnerabilities_found.saturating_add(1);
                Transition::Applied
            }
            EventKind::StatsSnapshot(snapshot) => {
                self.stats = stats::apply(&self.stats, snapshot);
                if let Some(reported) = snapshot.agents_count {
                    self.reported_agents = Some(reported);
                }
                if let Some(elapsed) = snapshot.elapsed_seconds {
                    self.elapsed_anchor = Some((event.timestamp, elapsed));
                }
                self.refresh_agents_count();
                Transition::Applied
            }
            EventKind::AgentStatus(update) => {
                if self.agents.mark_status(&update.agent_id, update.status) {
                    self.refresh_agent_views();
                }
                self.transcript.append(
                    event.timestamp,
                    agent_id.or(Some(update.agent_id.as_str())),
                    EntryBody::AgentStatus {
                        agent_id: update.agent_id.clone(),
                        status: update.status,
                        error: update.error.clone(),
                    },
                );
                Transition::Applied
            }
            EventKind::Complete(terminal) => {
                let status = SessionStatus::from(*terminal);
                self.status = status;
                self.transcript
                    .append(event.timestamp, agent_id, EntryBody::SessionEnded { status });
                info!(
                    session_id = %self.id,
                    status = %status,
                    entries = self.transcript.len(),
                    findings = self.findings.len(),
                    "session finished"
                );
                Transition::Terminated(status)
            }
            EventKind::Unknown(record) => {
                self.transcript.append(
                    event.timestamp,
                    agent_id,
                    EntryBody::Raw {
                        type_tag: record.type_tag.clone(),
                        text: record.raw.clone(),
                        reason: record.reason.to_string(),
                    },
                );
                Transition::Applied
            }
        };

        self.advance_elapsed(event);
        transition
    }

    /// Register or update the agent named by a tool result's `agent_info`.
    fn track_agent(&mut self, update: &ToolUpdate, tool: Option<&str>) {
        let Some(info) = agent_info(&update.result) else {
            return;
        };
        let Some(id) = info.get("id").and_then(id_string) else {
            debug!(session_id = %self.id, "agent_info without id ignored");
            return;
        };

        if self.agents.contains(&id) {
            if let Some(label) = info.get("status").and_then(Value::as_str) {
                self.agents.mark_status(&id, AgentStatus::from_label(label));
                self.refresh_agent_views();
            }
            return;
        }

        if !tool.map_or(true, is_agent_creation_tool) {
            debug!(session_id = %self.id, agent_id = %id, tool = ?tool, "agent_info on non-creation tool ignored");
            return;
        }

        let parent = info.get("parent_id").and_then(id_string);
        let name = info.get("name").and_then(Value::as_str).unwrap_or_default();
        let registration = self.agents.register_if_absent(&id, parent.as_deref(), name);
        if registration.inserted {
            info!(
                session_id = %self.id,
                agent_id = %id,
                parent_id = ?registration.attached_to,
                "sub-agent discovered"
            );
            self.refresh_agents_count();
            self.refresh_agent_views();
        }
    }

    fn refresh_agent_views(&mut self) {
        self.agent_views = OnceLock::new();
    }

    fn refresh_agents_count(&mut self) {
        let local = self.agents.len() as u64;
        self.stats.agents_count = self.reported_agents.map_or(local, |r| r.max(local));
    }

    /// Keep `elapsed_seconds` moving with event timestamps. Never decreases
    /// except when a snapshot overwrites it.
    fn advance_elapsed(&mut self, event: &Event) {
        let first = *self.first_event_at.get_or_insert(event.timestamp);
        let derived = match self.elapsed_anchor {
            Some((at, base)) => base.saturating_add(seconds_between(at, event.timestamp)),
            None => seconds_between(first, event.timestamp),
        };
        self.stats.elapsed_seconds = self.stats.elapsed_seconds.max(derived);
    }
}

/// Pure form of [`Session::apply`]: the next session and what happened.
pub fn reduce(session: &Session, event: &Event) -> (Session, Transition) {
    let mut next = session.clone();
    let transition = next.apply(event);
    (next, transition)
}

fn agent_info(result: &Value) -> Option<serde_json::Map<String, Value>> {
    match unwrap_json_string(result.get("agent_info")?) {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from((to - from).num_seconds()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
