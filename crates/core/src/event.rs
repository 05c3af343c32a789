// crates/core/src/event.rs
//! Decoder for raw agent-feed records.
//!
//! One record in, one typed [`Event`] out. Decoding never fails: a record the
//! decoder cannot make sense of becomes [`EventKind::Unknown`] carrying the
//! original text and the reason it was rejected.
//!
//! Upstream producers are inconsistent about pre-serialising nested values, so
//! `content` (and the `result` / `args` fields inside it) may arrive either as
//! JSON objects or as JSON-encoded strings. Both shapes get exactly one level of
//! string-to-JSON unwrapping.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::findings::Severity;
use crate::registry::AgentStatus;
use crate::session::SessionStatus;
use crate::stats::StatsSnapshot;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A decoded feed record. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Record id assigned by the feed (`id` field), used as a resume cursor.
    pub cursor: Option<String>,
    /// Agent that emitted the record, if the envelope names one.
    pub agent_id: Option<String>,
    /// Record timestamp, or the decoder's fallback instant when absent/invalid.
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    ToolStart(ToolStart),
    ToolUpdate(ToolUpdate),
    Chat(ChatTurn),
    Vulnerability(VulnerabilityReport),
    StatsSnapshot(StatsSnapshot),
    AgentStatus(AgentStatusUpdate),
    Complete(TerminalStatus),
    Unknown(UnknownRecord),
}

impl EventKind {
    /// Stable label, matching the wire `type` tag where one exists.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ToolStart(_) => "tool_start",
            EventKind::ToolUpdate(_) => "tool_update",
            EventKind::Chat(_) => "chat",
            EventKind::Vulnerability(_) => "vulnerability",
            EventKind::StatsSnapshot(_) => "stats",
            EventKind::AgentStatus(_) => "status",
            EventKind::Complete(_) => "complete",
            EventKind::Unknown(_) => "unknown",
        }
    }
}

/// A tool invocation announced by an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStart {
    pub tool: String,
    /// Tool arguments; `Value::Null` when the record carried none.
    pub args: Value,
    pub execution_id: Option<String>,
}

/// Progress or completion of a previously started tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUpdate {
    /// Tool name, when the producer repeated it on the update.
    pub tool: Option<String>,
    pub execution_id: Option<String>,
    /// Raw status label ("completed", "error", "running", ...).
    pub status: String,
    /// Full result, with one level of JSON-string unwrapping applied.
    pub result: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, ts_rs::TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Instruction issued by the operator.
    User,
    /// Reasoning or output produced by an agent.
    Agent,
}

impl ChatRole {
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("user") {
            ChatRole::User
        } else {
            ChatRole::Agent
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VulnerabilityReport {
    pub title: String,
    pub severity: Severity,
    pub vulnerability_type: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentStatusUpdate {
    pub agent_id: String,
    pub status: AgentStatus,
    pub error: Option<String>,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
    Stopped,
}

impl TerminalStatus {
    /// Map a terminal label to a status. Unrecognised labels count as failures:
    /// a run that ended for an unknown reason cannot be reported as a success.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "success" | "succeeded" => TerminalStatus::Completed,
            "stopped" | "cancelled" | "canceled" | "killed" => TerminalStatus::Stopped,
            _ => TerminalStatus::Failed,
        }
    }
}

impl From<TerminalStatus> for SessionStatus {
    fn from(status: TerminalStatus) -> Self {
        match status {
            TerminalStatus::Completed => SessionStatus::Completed,
            TerminalStatus::Failed => SessionStatus::Failed,
            TerminalStatus::Stopped => SessionStatus::Stopped,
        }
    }
}

/// A record that could not be decoded into a typed event.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownRecord {
    /// The record's `type` tag, when it got that far.
    pub type_tag: Option<String>,
    /// The original record text, untouched.
    pub raw: String,
    pub reason: DecodeError,
}

/// Why a record degraded to [`EventKind::Unknown`]. Never propagated; kept on
/// the event for display and logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record is not valid JSON: {message}")]
    Json { message: String },

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no `type` tag")]
    MissingType,

    #[error("unrecognised record type `{0}`")]
    UnrecognisedType(String),

    #[error("`{kind}` payload is not an object")]
    PayloadNotObject { kind: &'static str },

    #[error("`{kind}` payload is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Decode one raw record, using the current time for records without a
/// usable timestamp.
pub fn decode(raw: &str) -> Event {
    decode_at(raw, Utc::now())
}

/// Decode one raw record. `received_at` stands in for a missing or invalid
/// record timestamp.
pub fn decode_at(raw: &str, received_at: DateTime<Utc>) -> Event {
    let record = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return unknown(raw, None, None, None, received_at, DecodeError::NotAnObject),
        Err(e) => {
            return unknown(
                raw,
                None,
                None,
                None,
                received_at,
                DecodeError::Json {
                    message: e.to_string(),
                },
            )
        }
    };

    let cursor = record.get("id").and_then(id_string);
    let agent_id = record.get("agent_id").and_then(id_string);
    let timestamp = record
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or(received_at);

    let Some(type_tag) = record.get("type").and_then(Value::as_str) else {
        return unknown(raw, None, cursor, agent_id, timestamp, DecodeError::MissingType);
    };

    let content = record.get("content").map(unwrap_json_string).unwrap_or(Value::Null);

    let decoded = match type_tag {
        "tool_start" => decode_tool_start(&content).map(EventKind::ToolStart),
        "tool_update" => decode_tool_update(&content).map(EventKind::ToolUpdate),
        "chat" => Ok(EventKind::Chat(decode_chat(&content))),
        "vulnerability" => decode_vulnerability(&content).map(EventKind::Vulnerability),
        "stats" => match &content {
            Value::Object(map) => Ok(EventKind::StatsSnapshot(StatsSnapshot::from_map(map))),
            _ => Err(DecodeError::PayloadNotObject { kind: "stats" }),
        },
        "status" => decode_agent_status(&content, agent_id.as_deref()).map(EventKind::AgentStatus),
        "complete" => decode_complete(&record, &content).map(EventKind::Complete),
        other => Err(DecodeError::UnrecognisedType(other.to_string())),
    };

    match decoded {
        Ok(kind) => Event {
            cursor,
            agent_id,
            timestamp,
            kind,
        },
        Err(reason) => {
            tracing::debug!(type_tag, %reason, "feed record degraded to unknown");
            unknown(
                raw,
                Some(type_tag.to_string()),
                cursor,
                agent_id,
                timestamp,
                reason,
            )
        }
    }
}

/// Unwrap one level of JSON-in-a-string. Strings that do not parse are kept
/// as they are; every other value is returned unchanged.
pub fn unwrap_json_string(value: &Value) -> Value {
    match value {
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| value.clone()),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Per-kind decoding
// ---------------------------------------------------------------------------

fn as_object<'a>(content: &'a Value, kind: &'static str) -> Result<&'a Map<String, Value>, DecodeError> {
    content
        .as_object()
        .ok_or(DecodeError::PayloadNotObject { kind })
}

fn decode_tool_start(content: &Value) -> Result<ToolStart, DecodeError> {
    let map = as_object(content, "tool_start")?;
    let tool = str_field(map, &["tool", "tool_name"]).ok_or(DecodeError::MissingField {
        kind: "tool_start",
        field: "tool",
    })?;
    Ok(ToolStart {
        tool,
        args: map.get("args").map(unwrap_json_string).unwrap_or(Value::Null),
        execution_id: map.get("execution_id").and_then(id_string),
    })
}

fn decode_tool_update(content: &Value) -> Result<ToolUpdate, DecodeError> {
    let map = as_object(content, "tool_update")?;
    Ok(ToolUpdate {
        tool: str_field(map, &["tool", "tool_name"]),
        execution_id: map.get("execution_id").and_then(id_string),
        status: str_field(map, &["status"]).unwrap_or_else(|| "unknown".to_string()),
        result: map.get("result").map(unwrap_json_string).unwrap_or(Value::Null),
    })
}

fn decode_chat(content: &Value) -> ChatTurn {
    match content {
        Value::Object(map) => ChatTurn {
            role: map
                .get("role")
                .and_then(Value::as_str)
                .map(ChatRole::from_label)
                .unwrap_or(ChatRole::Agent),
            text: match map.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            },
        },
        // A bare string is agent output that skipped the usual envelope.
        Value::String(s) => ChatTurn {
            role: ChatRole::Agent,
            text: s.clone(),
        },
        Value::Null => ChatTurn {
            role: ChatRole::Agent,
            text: String::new(),
        },
        other => ChatTurn {
            role: ChatRole::Agent,
            text: other.to_string(),
        },
    }
}

fn decode_vulnerability(content: &Value) -> Result<VulnerabilityReport, DecodeError> {
    let map = as_object(content, "vulnerability")?;
    Ok(VulnerabilityReport {
        title: str_field(map, &["title", "name"]).unwrap_or_else(|| "Untitled finding".to_string()),
        severity: map
            .get("severity")
            .and_then(Value::as_str)
            .map(Severity::from_label)
            .unwrap_or(Severity::Unknown),
        vulnerability_type: str_field(map, &["vulnerability_type", "type"]),
        description: str_field(map, &["content", "description"]),
    })
}

fn decode_agent_status(
    content: &Value,
    envelope_agent: Option<&str>,
) -> Result<AgentStatusUpdate, DecodeError> {
    let map = as_object(content, "status")?;
    let agent_id = map
        .get("agent_id")
        .and_then(id_string)
        .or_else(|| envelope_agent.map(str::to_owned))
        .ok_or(DecodeError::MissingField {
            kind: "status",
            field: "agent_id",
        })?;
    let status = str_field(map, &["status"]).ok_or(DecodeError::MissingField {
        kind: "status",
        field: "status",
    })?;
    Ok(AgentStatusUpdate {
        agent_id,
        status: AgentStatus::from_label(&status),
        error: str_field(map, &["error", "error_message"]),
    })
}

fn decode_complete(record: &Map<String, Value>, content: &Value) -> Result<TerminalStatus, DecodeError> {
    let label = record
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| match content {
            Value::Object(map) => str_field(map, &["status"]),
            Value::String(s) => Some(s.clone()),
            _ => None,
        })
        .ok_or(DecodeError::MissingField {
            kind: "complete",
            field: "status",
        })?;
    Ok(TerminalStatus::from_label(&label))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn unknown(
    raw: &str,
    type_tag: Option<String>,
    cursor: Option<String>,
    agent_id: Option<String>,
    timestamp: DateTime<Utc>,
    reason: DecodeError,
) -> Event {
    Event {
        cursor,
        agent_id,
        timestamp,
        kind: EventKind::Unknown(UnknownRecord {
            type_tag,
            raw: raw.to_string(),
            reason,
        }),
    }
}

/// First non-empty string among `keys`.
fn str_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Ids arrive as numbers (database keys) or strings; normalise to a string.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339, or a naive ISO 8601 timestamp interpreted as UTC.
fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
