// crates/cli/src/render.rs
//! Plain-text rendering of transcript entries and session summaries.

use agentwatch_core::display::{truncate_chars, truncate_result, ResultTone, ToolView};
use agentwatch_core::event::ChatRole;
use agentwatch_core::{walk, AgentView, EntryBody, TranscriptEntry};
use agentwatch_live::{FeedState, LiveSnapshot};

/// Result previews in the terminal are shorter than the renderer default.
const CLI_RESULT_CHARS: usize = 400;
const RAW_PREVIEW_CHARS: usize = 120;

pub fn render_entry(entry: &TranscriptEntry) -> String {
    let time = entry.timestamp.format("%H:%M:%S");
    let who = entry.agent_id.as_deref().unwrap_or("-");
    let body = render_body(&entry.body);
    format!("[{time}] {who:<8} {body}")
}

fn render_body(body: &EntryBody) -> String {
    match body {
        EntryBody::ToolCall { tool, args, .. } => match ToolView::classify(tool, args) {
            ToolView::Terminal { command, special: true } => format!(">_ key {command}"),
            ToolView::Terminal { command, .. } => format!(">_ $ {command}"),
            ToolView::Browser { message } => format!("browser: {message}"),
            ToolView::Reasoning { thought } => format!("thinking: {thought}"),
            ToolView::Proxy { label, detail: Some(detail) } => format!("proxy: {label} {detail}"),
            ToolView::Proxy { label, detail: None } => format!("proxy: {label}"),
            ToolView::Generic { tool, args } if args.is_empty() => format!("using tool {tool}"),
            ToolView::Generic { tool, args } => {
                let preview: Vec<String> = args.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                format!("using tool {tool} ({})", preview.join(", "))
            }
        },
        EntryBody::ToolResult { tool, status, result, .. } => {
            let mark = match ResultTone::from_status(status) {
                ResultTone::Success => "ok",
                ResultTone::Error => "ERR",
                ResultTone::Pending => "..",
            };
            let name = tool.as_deref().unwrap_or("tool");
            let preview = truncate_result(result, CLI_RESULT_CHARS);
            let mut line = format!("  [{mark}] {name} {}", status.to_uppercase());
            if !preview.text.is_empty() {
                for l in preview.text.lines() {
                    line.push_str("\n            | ");
                    line.push_str(l);
                }
                if preview.truncated {
                    line.push_str("\n            | ...");
                }
            }
            line
        }
        EntryBody::Chat { role: ChatRole::User, text } => format!("user> {text}"),
        EntryBody::Chat { role: ChatRole::Agent, text } => format!("agent> {text}"),
        EntryBody::Finding { finding_id, title, severity } => {
            format!("!! [{}] {title} ({finding_id})", severity.as_str().to_uppercase())
        }
        EntryBody::AgentStatus { agent_id, status, error: Some(error) } => {
            format!("agent {agent_id} -> {status:?}: {error}")
        }
        EntryBody::AgentStatus { agent_id, status, error: None } => {
            format!("agent {agent_id} -> {status:?}")
        }
        EntryBody::SessionEnded { status } => format!("== session {status}"),
        EntryBody::Raw { text, reason, .. } => {
            let (preview, truncated) = truncate_chars(text, RAW_PREVIEW_CHARS);
            let ellipsis = if truncated { "..." } else { "" };
            format!("?? unreadable record ({reason}): {preview}{ellipsis}")
        }
    }
}

pub fn render_feed_state(snapshot: &LiveSnapshot) -> Option<String> {
    let line = match snapshot.feed {
        FeedState::Connecting => "connecting to feed".to_string(),
        FeedState::Live => "feed live".to_string(),
        FeedState::Interrupted => format!(
            "feed interrupted, reconnecting (attempt {}): {}",
            snapshot.reconnects,
            snapshot.last_error.as_deref().unwrap_or("unknown error")
        ),
        FeedState::Disconnected => format!(
            "feed lost: {}",
            snapshot.last_error.as_deref().unwrap_or("unknown error")
        ),
        FeedState::Closed => return None,
        FeedState::Cancelled => "feed closed by user".to_string(),
    };
    Some(line)
}

pub fn render_summary(snapshot: &LiveSnapshot) -> String {
    let session = &snapshot.session;
    let stats = &session.stats;
    let severity = &session.severity;

    let mut out = String::new();
    out.push_str(&format!("session {} - {}\n", session.id, session.status));
    out.push_str("agents:\n");
    render_agents(&session.agents, &mut out);
    out.push_str(&format!(
        "tools used: {}  findings: {} (critical {}, high {}, medium {}, low {}, unknown {})\n",
        stats.tools_used,
        stats.vulnerabilities_found,
        severity.critical,
        severity.high,
        severity.medium,
        severity.low,
        severity.unknown,
    ));
    out.push_str(&format!(
        "tokens: {} in / {} out  cost: {}  elapsed: {}s",
        stats.input_tokens, stats.output_tokens, stats.cost_estimate, stats.elapsed_seconds
    ));
    if snapshot.reconnects > 0 {
        out.push_str(&format!("\nreconnects: {}", snapshot.reconnects));
    }
    out
}

fn render_agents(agents: &[AgentView], out: &mut String) {
    for (depth, agent) in walk(agents) {
        out.push_str(&format!(
            "{}- {} [{}] {:?}\n",
            "  ".repeat(depth + 1),
            agent.name,
            agent.id,
            agent.status
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentwatch_core::{decode_at, Session};
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T10:00:05Z").unwrap().with_timezone(&Utc)
    }

    fn entry_for(record: serde_json::Value) -> String {
        let mut session = Session::new("s");
        session.apply(&decode_at(&record.to_string(), at()));
        render_entry(&session.transcript().entries()[0])
    }

    #[test]
    fn test_terminal_command() {
        let line = entry_for(json!({"agent_id": "main", "type": "tool_start",
            "content": {"tool": "terminal_execute", "args": {"command": "whoami"}}}));
        assert_eq!(line, "[10:00:05] main     >_ $ whoami");
    }

    #[test]
    fn test_special_key() {
        let line = entry_for(json!({"type": "tool_start",
            "content": {"tool": "terminal_execute", "args": {"command": "C-c"}}}));
        assert!(line.ends_with(">_ key C-c"));
    }

    #[test]
    fn test_tool_result_with_preview() {
        let line = entry_for(json!({"type": "tool_update",
            "content": {"tool": "terminal_execute", "status": "error", "result": "permission denied"}}));
        assert!(line.contains("[ERR] terminal_execute ERROR"));
        assert!(line.contains("| permission denied"));
    }

    #[test]
    fn test_finding_line() {
        let line = entry_for(json!({"type": "vulnerability", "content": {"title": "SQLi", "severity": "high"}}));
        assert!(line.ends_with("!! [HIGH] SQLi (finding-1)"));
    }

    #[test]
    fn test_raw_line() {
        let mut session = Session::new("s");
        session.apply(&decode_at("{not json", at()));
        let line = render_entry(&session.transcript().entries()[0]);
        assert!(line.contains("?? unreadable record"));
        assert!(line.ends_with("{not json"));
    }

    #[test]
    fn test_summary_lists_agents() {
        let mut session = Session::new("scan-1");
        session.apply(&decode_at(
            &json!({"type": "tool_update", "content": {"tool": "create_agent", "status": "completed",
                "result": {"agent_info": {"id": "a1", "parent_id": "main", "name": "Recon"}}}})
            .to_string(),
            at(),
        ));
        let snapshot = LiveSnapshot {
            session: session.snapshot(),
            feed: FeedState::Closed,
            reconnects: 0,
            last_error: None,
        };
        let summary = render_summary(&snapshot);
        assert!(summary.starts_with("session scan-1 - running\n"));
        assert!(summary.contains("  - Main Agent [main] Running\n    - Recon [a1] Running\n"));
        assert!(summary.contains("cost: $0.0000"));
    }

    #[test]
    fn test_feed_state_lines() {
        let mut snapshot = LiveSnapshot {
            session: Session::new("s").snapshot(),
            feed: FeedState::Interrupted,
            reconnects: 2,
            last_error: Some("connection reset".into()),
        };
        assert_eq!(
            render_feed_state(&snapshot).as_deref(),
            Some("feed interrupted, reconnecting (attempt 2): connection reset")
        );
        snapshot.feed = FeedState::Closed;
        assert!(render_feed_state(&snapshot).is_none());
    }
}
