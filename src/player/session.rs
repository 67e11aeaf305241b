//! Session lifecycle and statistics for relay streams
//!
//! Every playback request owns exactly one [`RelaySession`], driven through
//! an explicit state machine:
//!
//! `Init -> Resolving -> {Streaming | Transcoding} -> {Completed | Errored | Cancelled}`
//!
//! Terminal states are final; all transition paths are idempotent so that
//! racing signals (a disconnect arriving after natural completion, a timeout
//! firing during teardown) collapse into the first recorded outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::EntityKind;
use crate::utils::human_format::{format_bytes, format_duration_secs};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Resolving,
    Streaming,
    Transcoding,
    Completed,
    Errored,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Init => "init",
            SessionState::Resolving => "resolving",
            SessionState::Streaming => "streaming",
            SessionState::Transcoding => "transcoding",
            SessionState::Completed => "completed",
            SessionState::Errored => "errored",
            SessionState::Cancelled => "cancelled",
        }
    }
}

/// State and transfer statistics for one playback session
#[derive(Debug, Clone)]
pub struct RelaySession {
    pub id: Uuid,
    pub stream_type: EntityKind,
    pub title: String,
    pub upstream_url: String,
    pub state: SessionState,
    pub bytes_transferred: u64,
    pub chunks: u64,
    pub started_at: Instant,
}

impl RelaySession {
    fn new(id: Uuid, stream_type: EntityKind) -> Self {
        Self {
            id,
            stream_type,
            title: String::new(),
            upstream_url: String::new(),
            state: SessionState::Init,
            bytes_transferred: 0,
            chunks: 0,
            started_at: Instant::now(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Tracks all live sessions and owns every state transition.
///
/// Cloning is cheap; clones share the same session map.
#[derive(Clone, Default)]
pub struct SessionTracker {
    sessions: Arc<RwLock<HashMap<Uuid, RelaySession>>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session in `Init` state and return its correlation id.
    pub async fn begin(&self, stream_type: EntityKind) -> Uuid {
        let id = Uuid::new_v4();
        let session = RelaySession::new(id, stream_type);
        debug!(session = %id, stream_type = %stream_type, "Session started");
        self.sessions.write().await.insert(id, session);
        id
    }

    /// Attach the resolved source to the session record.
    pub async fn describe(&self, id: Uuid, title: &str, upstream_url: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.title = title.to_string();
            session.upstream_url = upstream_url.to_string();
        }
    }

    /// Attempt a state transition. Returns false (and changes nothing) when
    /// the session is gone or already in a terminal state.
    pub async fn transition(&self, id: Uuid, next: SessionState) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if !session.state.is_terminal() => {
                debug!(
                    session = %id,
                    from = session.state.as_str(),
                    to = next.as_str(),
                    "Session transition"
                );
                session.state = next;
                true
            }
            _ => false,
        }
    }

    /// Record forwarded bytes; the counter is observational only, never used
    /// for flow control.
    pub async fn add_bytes(&self, id: Uuid, bytes: u64) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.bytes_transferred += bytes;
            session.chunks += 1;
        }
    }

    /// Drive a session to a terminal outcome, remove it, and log a summary.
    /// Idempotent: a session that was already finished (or never existed)
    /// yields `None` and nothing is logged.
    pub async fn finish(&self, id: Uuid, outcome: SessionState) -> Option<RelaySession> {
        debug_assert!(outcome.is_terminal());
        let mut session = self.sessions.write().await.remove(&id)?;
        session.state = outcome;

        let duration = format_duration_secs(session.duration().as_secs());
        let transferred = format_bytes(session.bytes_transferred);
        match outcome {
            SessionState::Cancelled => debug!(
                session = %id,
                stream_type = %session.stream_type,
                title = %session.title,
                duration = %duration,
                transferred = %transferred,
                "Client disconnected"
            ),
            SessionState::Errored => warn!(
                session = %id,
                stream_type = %session.stream_type,
                title = %session.title,
                duration = %duration,
                transferred = %transferred,
                "Session errored"
            ),
            _ => info!(
                session = %id,
                stream_type = %session.stream_type,
                title = %session.title,
                duration = %duration,
                transferred = %transferred,
                chunks = session.chunks,
                "Stream ended"
            ),
        }
        Some(session)
    }

    pub async fn get(&self, id: Uuid) -> Option<RelaySession> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Start the periodic active-session summary task.
    pub fn start_summary_reporter(&self, interval: Duration) {
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let sessions = sessions.read().await;
                if sessions.is_empty() {
                    continue;
                }
                let total_bytes: u64 = sessions.values().map(|s| s.bytes_transferred).sum();
                info!(
                    "Session summary: {} active | {} transferred",
                    sessions.len(),
                    format_bytes(total_bytes)
                );
                for session in sessions.values() {
                    debug!(
                        session = %session.id,
                        state = session.state.as_str(),
                        title = %session.title,
                        transferred = %format_bytes(session.bytes_transferred),
                        "Session detail"
                    );
                }
            }
        });
    }
}

/// The single teardown funnel for one session.
///
/// The guard rides inside the response body stream; when the stream is
/// dropped before a terminal outcome was recorded (client disconnect,
/// timeout teardown), the drop finishes the session as `Cancelled`. Natural
/// completion finishes the session first, making the drop a no-op.
pub struct SessionGuard {
    tracker: SessionTracker,
    id: Uuid,
}

impl SessionGuard {
    pub fn new(tracker: SessionTracker, id: Uuid) -> Self {
        Self { tracker, id }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let tracker = self.tracker.clone();
        let id = self.id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                tracker.finish(id, SessionState::Cancelled).await;
            });
        }
    }
}
