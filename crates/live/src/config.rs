// crates/live/src/config.rs
//! Feed configuration from environment variables.
//!
//! | variable | default |
//! |----------|---------|
//! | `AGENTWATCH_API_URL` | `http://localhost:8000` |
//! | `AGENTWATCH_TOKEN` | unset |
//! | `AGENTWATCH_MAX_RECONNECTS` | `5` |
//! | `AGENTWATCH_RECONNECT_DELAY_MS` | `1000` |
//! | `AGENTWATCH_MAX_RECONNECT_DELAY_MS` | `30000` |
//! | `AGENTWATCH_RESUME_SUPPORTED` | `false` |

use std::time::Duration;

use crate::error::ConfigError;
use crate::supervisor::SupervisorConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_MAX_RECONNECTS: u32 = 5;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;
const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Backend base URL, without a trailing slash.
    pub api_url: String,
    pub token: Option<String>,
    pub max_reconnects: u32,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    /// Whether the feed honours `Last-Event-ID`.
    pub resume_supported: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            max_reconnects: DEFAULT_MAX_RECONNECTS,
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(DEFAULT_MAX_RECONNECT_DELAY_MS),
            resume_supported: false,
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = get("AGENTWATCH_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let max_reconnects = match get("AGENTWATCH_MAX_RECONNECTS") {
            Some(v) => parse_number("AGENTWATCH_MAX_RECONNECTS", v)?,
            None => DEFAULT_MAX_RECONNECTS,
        };
        let reconnect_delay_ms = match get("AGENTWATCH_RECONNECT_DELAY_MS") {
            Some(v) => parse_number("AGENTWATCH_RECONNECT_DELAY_MS", v)?,
            None => DEFAULT_RECONNECT_DELAY_MS,
        };
        let max_reconnect_delay_ms = match get("AGENTWATCH_MAX_RECONNECT_DELAY_MS") {
            Some(v) => parse_number("AGENTWATCH_MAX_RECONNECT_DELAY_MS", v)?,
            None => DEFAULT_MAX_RECONNECT_DELAY_MS,
        };
        let resume_supported = match get("AGENTWATCH_RESUME_SUPPORTED") {
            Some(v) => parse_flag("AGENTWATCH_RESUME_SUPPORTED", v)?,
            None => false,
        };

        Ok(Self {
            api_url,
            token: get("AGENTWATCH_TOKEN"),
            max_reconnects,
            reconnect_delay: Duration::from_millis(reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(max_reconnect_delay_ms.max(reconnect_delay_ms)),
            resume_supported,
        })
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            max_reconnects: self.max_reconnects,
            initial_backoff: self.reconnect_delay,
            max_backoff: self.max_reconnect_delay,
        }
    }
}

fn parse_number<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<FeedConfig, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        FeedConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config(&[]).unwrap(), FeedConfig::default());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("AGENTWATCH_API_URL", "https://console.example/"),
            ("AGENTWATCH_TOKEN", "tok"),
            ("AGENTWATCH_MAX_RECONNECTS", "2"),
            ("AGENTWATCH_RECONNECT_DELAY_MS", "250"),
            ("AGENTWATCH_MAX_RECONNECT_DELAY_MS", "4000"),
            ("AGENTWATCH_RESUME_SUPPORTED", "TRUE"),
        ])
        .unwrap();
        assert_eq!(cfg.api_url, "https://console.example");
        assert_eq!(cfg.token.as_deref(), Some("tok"));
        assert_eq!(cfg.max_reconnects, 2);
        assert_eq!(cfg.reconnect_delay, Duration::from_millis(250));
        assert_eq!(cfg.max_reconnect_delay, Duration::from_secs(4));
        assert!(cfg.resume_supported);
    }

    #[test]
    fn test_blank_token_is_unset() {
        assert!(config(&[("AGENTWATCH_TOKEN", "  ")]).unwrap().token.is_none());
    }

    #[test]
    fn test_invalid_number() {
        let err = config(&[("AGENTWATCH_MAX_RECONNECTS", "many")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "AGENTWATCH_MAX_RECONNECTS",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_flag() {
        assert!(config(&[("AGENTWATCH_RESUME_SUPPORTED", "maybe")]).is_err());
    }

    #[test]
    fn test_max_delay_never_below_initial() {
        let cfg = config(&[
            ("AGENTWATCH_RECONNECT_DELAY_MS", "5000"),
            ("AGENTWATCH_MAX_RECONNECT_DELAY_MS", "100"),
        ])
        .unwrap();
        assert_eq!(cfg.max_reconnect_delay, Duration::from_secs(5));
    }
}
