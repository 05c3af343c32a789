// crates/live/tests/manager_test.rs
use std::sync::{Arc, Mutex};

use agentwatch_core::SessionStatus;
use agentwatch_live::{
    Connector, ControlError, EventSource, FeedManager, FeedState, ResumePoint, ScanControl,
    SourceError, SupervisorConfig,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;

/// Yields the given records, then stays open forever.
struct OpenFeed(Vec<String>);

struct OpenSource(std::vec::IntoIter<String>);

#[async_trait]
impl EventSource for OpenSource {
    async fn next_record(&mut self) -> Result<Option<String>, SourceError> {
        match self.0.next() {
            Some(r) => Ok(Some(r)),
            None => std::future::pending().await,
        }
    }
}

#[async_trait]
impl Connector for OpenFeed {
    async fn connect(&self, _resume: &ResumePoint) -> Result<Box<dyn EventSource>, SourceError> {
        Ok(Box::new(OpenSource(self.0.clone().into_iter())))
    }

    fn name(&self) -> &str {
        "open"
    }
}

#[derive(Default)]
struct RecordingControl {
    stopped: Mutex<Vec<String>>,
}

#[async_trait]
impl ScanControl for RecordingControl {
    async fn stop(&self, session_id: &str) -> Result<(), ControlError> {
        self.stopped.lock().unwrap().push(session_id.to_string());
        Ok(())
    }
}

fn chat(text: &str) -> String {
    format!(r#"{{"type":"chat","content":{{"role":"assistant","content":"{text}"}}}}"#)
}

fn feed(records: &[String]) -> Arc<dyn Connector> {
    Arc::new(OpenFeed(records.to_vec()))
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let manager = FeedManager::new(Arc::new(RecordingControl::default()), SupervisorConfig::default());
    let a = manager.open("a", feed(&[chat("one")])).await;
    let b = manager.open("b", feed(&[chat("one"), chat("two")])).await;

    a.subscribe().wait_for(|s| s.session.transcript.len() == 1).await.unwrap();
    b.subscribe().wait_for(|s| s.session.transcript.len() == 2).await.unwrap();

    assert_eq!(manager.snapshot("a").await.unwrap().session.transcript.len(), 1);
    assert_eq!(manager.snapshot("b").await.unwrap().session.transcript.len(), 2);
    assert_eq!(manager.session_ids().await, vec!["a".to_string(), "b".to_string()]);
    assert!(manager.snapshot("c").await.is_none());

    manager.close_all().await;
    assert!(manager.session_ids().await.is_empty());
}

#[tokio::test]
async fn test_open_twice_returns_existing_supervisor() {
    let manager = FeedManager::new(Arc::new(RecordingControl::default()), SupervisorConfig::default());
    let first = manager.open("s", feed(&[chat("x")])).await;
    first.subscribe().wait_for(|s| s.session.transcript.len() == 1).await.unwrap();

    let second = manager.open("s", feed(&[])).await;
    assert_eq!(second.snapshot().session.transcript.len(), 1);
    manager.close_all().await;
}

#[tokio::test]
async fn test_stop_goes_to_control_and_leaves_state() {
    let control = Arc::new(RecordingControl::default());
    let manager = FeedManager::new(control.clone(), SupervisorConfig::default());
    let handle = manager.open("s", feed(&[chat("x")])).await;
    handle.subscribe().wait_for(|s| s.session.transcript.len() == 1).await.unwrap();

    manager.stop("s").await.unwrap();
    assert_eq!(*control.stopped.lock().unwrap(), vec!["s".to_string()]);
    assert_eq!(handle.snapshot().session.status, SessionStatus::Running);
    manager.close_all().await;
}

#[tokio::test]
async fn test_close_cancels_and_returns_last_snapshot() {
    let manager = FeedManager::new(Arc::new(RecordingControl::default()), SupervisorConfig::default());
    let handle = manager.open("s", feed(&[chat("x")])).await;
    handle.subscribe().wait_for(|s| s.session.transcript.len() == 1).await.unwrap();

    let last = manager.close("s").await.unwrap();
    assert_eq!(last.feed, FeedState::Cancelled);
    assert_eq!(last.session.transcript.len(), 1);
    assert!(manager.subscribe("s").await.is_none());
    assert!(manager.close("s").await.is_none());
}
