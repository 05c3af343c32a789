// crates/live/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors from an event source. Never shown to renderers: the supervisor turns
/// them into feed state and reconnect attempts.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("feed request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("feed rejected with HTTP {status}")]
    Rejected { status: u16 },

    /// The event stream itself broke: bad UTF-8 or unparseable SSE framing.
    #[error("feed stream malformed: {message}")]
    Malformed { message: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether reconnecting could help. Client errors (bad token, unknown
    /// scan), missing files and undecodable bytes will not fix themselves.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Transport { .. } | SourceError::Malformed { .. } => true,
            SourceError::Rejected { status } => !(400..500).contains(status) || *status == 408 || *status == 429,
            SourceError::Io { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::InvalidData
            ),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(source: reqwest::Error) -> Self {
        SourceError::Transport { source }
    }
}

/// Errors from [`crate::control::ScanControl`].
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("stop request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stop rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
