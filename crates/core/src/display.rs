// crates/core/src/display.rs
//! Presentation helpers for renderers. Nothing here feeds back into session
//! state.

use serde_json::Value;

/// Maximum characters of a tool result shown inline.
pub const RESULT_PREVIEW_CHARS: usize = 1000;
/// Maximum characters of each argument shown for generic tools.
pub const ARG_PREVIEW_CHARS: usize = 30;
const GENERIC_ARG_COUNT: usize = 2;

const PROXY_TOOLS: &[&str] = &[
    "send_request",
    "view_request",
    "repeat_request",
    "scope_rules",
    "list_sitemap",
];

/// How a tool call should be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolView {
    /// Shell command sent to the agent's terminal. `special` marks key
    /// sequences (`C-c`, `^D`, `Enter`, `Escape`) rather than commands.
    Terminal { command: String, special: bool },
    Browser { message: String },
    Reasoning { thought: String },
    Proxy { label: String, detail: Option<String> },
    /// Anything else: tool name plus the first few arguments, truncated.
    Generic { tool: String, args: Vec<(String, String)> },
}

impl ToolView {
    pub fn classify(tool: &str, args: &Value) -> Self {
        match tool {
            "terminal_execute" => {
                let command = str_arg(args, "command").unwrap_or_default().to_string();
                let special = command.starts_with("C-")
                    || command.starts_with('^')
                    || command == "Enter"
                    || command == "Escape";
                ToolView::Terminal { command, special }
            }
            "browser_action" => {
                let action = str_arg(args, "action").unwrap_or("unknown");
                let message = match action {
                    "goto" => format!("navigating to {}", str_arg(args, "url").unwrap_or_default()),
                    "click" => "clicking element".to_string(),
                    "type" => format!("typing \"{}\"", str_arg(args, "text").unwrap_or_default()),
                    "screenshot" => "taking screenshot".to_string(),
                    other => other.to_string(),
                };
                ToolView::Browser { message }
            }
            "think" => ToolView::Reasoning {
                thought: str_arg(args, "thought").unwrap_or_default().to_string(),
            },
            t if PROXY_TOOLS.contains(&t) => match t {
                "send_request" => ToolView::Proxy {
                    label: format!("Sending {}", str_arg(args, "method").unwrap_or("GET")),
                    detail: str_arg(args, "url").map(str::to_owned),
                },
                "view_request" => ToolView::Proxy {
                    label: format!("Viewing {}", str_arg(args, "part").unwrap_or("request")),
                    detail: None,
                },
                _ => ToolView::Proxy {
                    label: "Viewing".to_string(),
                    detail: None,
                },
            },
            _ => ToolView::Generic {
                tool: tool.to_string(),
                args: generic_args(args),
            },
        }
    }
}

/// Visual tone for a tool result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTone {
    Success,
    Error,
    Pending,
}

impl ResultTone {
    pub fn from_status(status: &str) -> Self {
        match status {
            "completed" => ResultTone::Success,
            "error" | "failed" => ResultTone::Error,
            _ => ResultTone::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPreview {
    pub text: String,
    /// True when `text` was cut short.
    pub truncated: bool,
}

/// Render a tool result as text, cut to `limit` characters. Strings are
/// shown verbatim, everything else pretty-printed.
pub fn truncate_result(result: &Value, limit: usize) -> ResultPreview {
    let full = match result {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    let (text, truncated) = truncate_chars(&full, limit);
    ResultPreview { text, truncated }
}

/// First `limit` chars of `s` (not bytes), and whether anything was dropped.
pub fn truncate_chars(s: &str, limit: usize) -> (String, bool) {
    match s.char_indices().nth(limit) {
        Some((byte_idx, _)) => (s[..byte_idx].to_string(), true),
        None => (s.to_string(), false),
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn generic_args(args: &Value) -> Vec<(String, String)> {
    let Some(map) = args.as_object() else {
        return Vec::new();
    };
    map.iter()
        .take(GENERIC_ARG_COUNT)
        .map(|(k, v)| {
            let rendered = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), truncate_chars(&rendered, ARG_PREVIEW_CHARS).0)
        })
        .collect()
}
