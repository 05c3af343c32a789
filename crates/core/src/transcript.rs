// crates/core/src/transcript.rs
//! Append-only, arrival-ordered log of renderable entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use ts_rs::TS;

use crate::event::ChatRole;
use crate::findings::Severity;
use crate::registry::AgentStatus;
use crate::session::SessionStatus;
use crate::shared_log::SharedLog;

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Position in the log, starting at 0.
    #[ts(type = "number")]
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub agent_id: Option<String>,
    pub body: EntryBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryBody {
    ToolCall {
        tool: String,
        args: Value,
        execution_id: Option<String>,
    },
    ToolResult {
        /// Resolved from the matching call when the update omitted it.
        tool: Option<String>,
        execution_id: Option<String>,
        status: String,
        result: Value,
    },
    Chat {
        role: ChatRole,
        text: String,
    },
    Finding {
        finding_id: String,
        title: String,
        severity: Severity,
    },
    AgentStatus {
        agent_id: String,
        status: AgentStatus,
        error: Option<String>,
    },
    SessionEnded {
        status: SessionStatus,
    },
    /// A record that did not decode. Shown as-is.
    Raw {
        type_tag: Option<String>,
        text: String,
        reason: String,
    },
}

/// Cloning is cheap: clones share every sealed chunk of entries.
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    entries: SharedLog<TranscriptEntry>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its sequence number.
    pub fn append(&mut self, timestamp: DateTime<Utc>, agent_id: Option<&str>, body: EntryBody) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(Arc::new(TranscriptEntry {
            seq,
            timestamp,
            agent_id: agent_id.map(str::to_owned),
            body,
        }));
        seq
    }

    pub fn entries(&self) -> &SharedLog<TranscriptEntry> {
        &self.entries
    }

    /// Entries with `seq >= from`.
    pub fn since(&self, from: u64) -> impl Iterator<Item = &Arc<TranscriptEntry>> + '_ {
        self.entries.iter_from(usize::try_from(from).unwrap_or(usize::MAX))
    }

    pub fn last(&self) -> Option<&Arc<TranscriptEntry>> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chat(text: &str) -> EntryBody {
        EntryBody::Chat {
            role: ChatRole::Agent,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let mut log = TranscriptLog::new();
        let now = Utc::now();
        assert_eq!(log.append(now, None, chat("one")), 0);
        assert_eq!(log.append(now, Some("a1"), chat("two")), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[1].agent_id.as_deref(), Some("a1"));
        assert_eq!(log.entries()[1].body, chat("two"));
    }

    #[test]
    fn test_since() {
        let mut log = TranscriptLog::new();
        let now = Utc::now();
        for i in 0..5 {
            log.append(now, None, chat(&i.to_string()));
        }
        let seqs: Vec<u64> = log.since(3).map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
        assert_eq!(log.since(99).count(), 0);
    }

    #[test]
    fn test_body_serializes_with_kind_tag() {
        let body = EntryBody::ToolCall {
            tool: "think".into(),
            args: json!({"thought": "x"}),
            execution_id: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["kind"], "tool_call");
        assert_eq!(value["tool"], "think");
    }
}
