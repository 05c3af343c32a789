// crates/live/src/manager.rs
//! Independent supervisors keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::info;

use crate::control::ScanControl;
use crate::error::ControlError;
use crate::source::Connector;
use crate::supervisor::{LiveSnapshot, Supervisor, SupervisorConfig, SupervisorHandle};

/// Shared map of open sessions.
pub type SupervisorMap = Arc<RwLock<HashMap<String, SupervisorHandle>>>;

pub struct FeedManager {
    sessions: SupervisorMap,
    control: Arc<dyn ScanControl>,
    config: SupervisorConfig,
}

impl FeedManager {
    pub fn new(control: Arc<dyn ScanControl>, config: SupervisorConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            control,
            config,
        }
    }

    /// Start supervising a session. A session that is already being
    /// supervised keeps its existing supervisor; a finished one is restarted.
    pub async fn open(&self, session_id: &str, connector: Arc<dyn Connector>) -> SupervisorHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(session_id) {
            if !existing.is_finished() {
                return existing.clone();
            }
        }
        let handle = Supervisor::spawn(session_id, connector, self.config.clone());
        sessions.insert(session_id.to_string(), handle.clone());
        info!(session_id, open_sessions = sessions.len(), "session opened");
        handle
    }

    pub async fn snapshot(&self, session_id: &str) -> Option<Arc<LiveSnapshot>> {
        self.sessions.read().await.get(session_id).map(SupervisorHandle::snapshot)
    }

    pub async fn subscribe(&self, session_id: &str) -> Option<watch::Receiver<Arc<LiveSnapshot>>> {
        self.sessions.read().await.get(session_id).map(SupervisorHandle::subscribe)
    }

    /// Ask the backend to halt the run. Session state changes only when the
    /// feed delivers the terminal record.
    pub async fn stop(&self, session_id: &str) -> Result<(), ControlError> {
        self.control.stop(session_id).await
    }

    /// Cancel a session's supervisor and forget it. Returns the last snapshot.
    pub async fn close(&self, session_id: &str) -> Option<Arc<LiveSnapshot>> {
        let handle = self.sessions.write().await.remove(session_id)?;
        handle.cancel();
        info!(session_id, "session closed");
        Some(handle.join().await)
    }

    pub async fn close_all(&self) {
        let handles: Vec<SupervisorHandle> = self.sessions.write().await.drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.cancel();
        }
        for handle in &handles {
            handle.join().await;
        }
        info!(closed = handles.len(), "all sessions closed");
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
