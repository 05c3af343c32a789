// crates/live/src/control.rs
//! Run lifecycle control.
//!
//! Stopping only asks the backend to halt the run. The session itself moves to
//! `stopped` when the feed delivers the terminal record.

use async_trait::async_trait;
use tracing::info;

use crate::error::ControlError;

#[async_trait]
pub trait ScanControl: Send + Sync {
    /// Ask the backend to halt the run.
    async fn stop(&self, session_id: &str) -> Result<(), ControlError>;
}

/// Issues `DELETE {base}/api/offensive/scans/{id}`.
#[derive(Debug, Clone)]
pub struct HttpScanControl {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpScanControl {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn scan_url(&self, session_id: &str) -> String {
        format!("{}/api/offensive/scans/{}", self.base_url, session_id)
    }
}

#[async_trait]
impl ScanControl for HttpScanControl {
    async fn stop(&self, session_id: &str) -> Result<(), ControlError> {
        let mut request = self.client.delete(self.scan_url(session_id));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControlError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(session_id, "stop requested");
        Ok(())
    }
}
