// crates/live/src/supervisor.rs
//! One supervisor per run.
//!
//! The supervisor owns the [`Session`], pulls raw records from its source in
//! arrival order, decodes and applies each one, and publishes an immutable
//! [`LiveSnapshot`] after every event. Transport failures never reach the
//! session: they show up as [`FeedState::Interrupted`] while a reconnect is
//! pending.
//!
//! On reconnect the source is asked to continue after the last cursor. When it
//! can only replay from the start, the records already delivered are skipped
//! so optimistic counters are not bumped twice.

use std::sync::Arc;
use std::time::Duration;

use agentwatch_core::{decode, Session, SessionSnapshot};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ts_rs::TS;

use crate::error::SourceError;
use crate::metrics;
use crate::source::{Connector, EventSource, ResumeMode, ResumePoint};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Connection state of a session's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Connecting,
    Live,
    /// The stream broke; a reconnect is pending.
    Interrupted,
    /// Reconnects exhausted or the feed refused us. The session may still be
    /// running upstream.
    Disconnected,
    /// The feed delivered a terminal record or ended.
    Closed,
    Cancelled,
}

impl FeedState {
    /// No more snapshots will follow.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            FeedState::Disconnected | FeedState::Closed | FeedState::Cancelled
        )
    }
}

/// What renderers receive: the session plus feed health.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub session: SessionSnapshot,
    pub feed: FeedState,
    pub reconnects: u32,
    /// Last transport problem, for display only.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Consecutive failed connections tolerated before giving up.
    pub max_reconnects: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_reconnects: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Cheap, cloneable handle to a running supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    session_id: Arc<str>,
    state: watch::Receiver<Arc<LiveSnapshot>>,
    cancel: CancellationToken,
}

impl SupervisorHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<LiveSnapshot> {
        Arc::clone(&self.state.borrow())
    }

    /// Receiver that wakes on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<LiveSnapshot>> {
        self.state.clone()
    }

    /// Close the source and stop reducing. Queued records are dropped; the
    /// last snapshot stays readable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().feed.is_final()
    }

    /// Wait for the supervisor to finish and return its final snapshot.
    pub async fn join(&self) -> Arc<LiveSnapshot> {
        let mut rx = self.state.clone();
        if let Err(error) = rx.wait_for(|s| s.feed.is_final()).await {
            debug!(session_id = %self.session_id, error = %error, "supervisor task gone before a final state");
        }
        let last = Arc::clone(&rx.borrow());
        last
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct Supervisor {
    session: Session,
    connector: Arc<dyn Connector>,
    config: SupervisorConfig,
    tx: watch::Sender<Arc<LiveSnapshot>>,
    cancel: CancellationToken,
    /// Cursor of the last delivered record that carried one.
    cursor: Option<String>,
    delivered: u64,
    reconnects: u32,
    last_error: Option<String>,
}

enum PumpOutcome {
    /// Terminal record applied.
    Finished,
    /// Source ended without a terminal record.
    Ended,
    Cancelled,
    Failed { error: SourceError, progressed: bool },
}

impl Supervisor {
    /// Start supervising `session_id` on the current tokio runtime.
    pub fn spawn(
        session_id: impl Into<String>,
        connector: Arc<dyn Connector>,
        config: SupervisorConfig,
    ) -> SupervisorHandle {
        let session_id: String = session_id.into();
        let session = Session::new(session_id.clone());
        let (tx, rx) = watch::channel(Arc::new(LiveSnapshot {
            session: session.snapshot(),
            feed: FeedState::Connecting,
            reconnects: 0,
            last_error: None,
        }));
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            session,
            connector,
            config,
            tx,
            cancel: cancel.clone(),
            cursor: None,
            delivered: 0,
            reconnects: 0,
            last_error: None,
        };
        tokio::spawn(supervisor.run());

        SupervisorHandle {
            session_id: session_id.into(),
            state: rx,
            cancel,
        }
    }

    async fn run(mut self) {
        let session_id = self.session.id().to_string();
        info!(session_id = %session_id, source = self.connector.name(), "supervisor started");
        metrics::session_opened();

        let mut backoff = self.config.initial_backoff;
        let mut failures: u32 = 0;

        let final_state = loop {
            let resume = ResumePoint {
                cursor: self.cursor.clone(),
                delivered: self.delivered,
            };
            let connected = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break FeedState::Cancelled,
                result = self.connector.connect(&resume) => result,
            };

            let error = match connected {
                Ok(source) => match self.pump(source).await {
                    PumpOutcome::Finished | PumpOutcome::Ended => break FeedState::Closed,
                    PumpOutcome::Cancelled => break FeedState::Cancelled,
                    PumpOutcome::Failed { error, progressed } => {
                        if progressed {
                            failures = 0;
                            backoff = self.config.initial_backoff;
                        }
                        error
                    }
                },
                Err(error) => error,
            };

            self.last_error = Some(error.to_string());
            if !error.is_retryable() {
                warn!(session_id = %session_id, error = %error, "feed failed permanently");
                break FeedState::Disconnected;
            }
            if failures >= self.config.max_reconnects {
                warn!(
                    session_id = %session_id,
                    attempts = failures,
                    error = %error,
                    "giving up on feed after repeated failures"
                );
                break FeedState::Disconnected;
            }

            failures += 1;
            self.reconnects += 1;
            metrics::record_reconnect();
            self.publish(FeedState::Interrupted);
            warn!(
                session_id = %session_id,
                attempt = failures,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "feed interrupted, reconnecting"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break FeedState::Cancelled,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(self.config.max_backoff);
        };

        if final_state == FeedState::Cancelled {
            info!(session_id = %session_id, delivered = self.delivered, "supervisor cancelled");
        } else {
            info!(
                session_id = %session_id,
                feed = ?final_state,
                status = %self.session.status(),
                delivered = self.delivered,
                "supervisor finished"
            );
        }
        self.publish(final_state);
        metrics::session_closed();
    }

    /// Read one connection until it ends, fails, or the session terminates.
    async fn pump(&mut self, mut source: Box<dyn EventSource>) -> PumpOutcome {
        let mut skip = match (source.resume_mode(), &self.cursor) {
            (ResumeMode::FromCursor, Some(_)) => 0,
            _ => self.delivered,
        };
        if skip > 0 {
            debug!(session_id = %self.session.id(), skip, "source replays from start, skipping delivered records");
        }
        self.publish(FeedState::Live);

        let mut progressed = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return PumpOutcome::Cancelled,
                next = source.next_record() => next,
            };

            let raw = match next {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    debug!(session_id = %self.session.id(), "source ended");
                    return PumpOutcome::Ended;
                }
                Err(error) => return PumpOutcome::Failed { error, progressed },
            };

            if skip > 0 {
                skip -= 1;
                continue;
            }

            let event = decode(&raw);
            self.delivered += 1;
            progressed = true;
            if let Some(cursor) = &event.cursor {
                self.cursor = Some(cursor.clone());
            }
            metrics::record_event(event.kind.as_str());

            let transition = self.session.apply(&event);
            self.publish(FeedState::Live);
            if transition.is_terminal() {
                return PumpOutcome::Finished;
            }
        }
    }

    fn publish(&self, feed: FeedState) {
        self.tx.send_replace(Arc::new(LiveSnapshot {
            session: self.session.snapshot(),
            feed,
            reconnects: self.reconnects,
            last_error: self.last_error.clone(),
        }));
    }
}
