//! Session record kept for every started session.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::protocol::ProtocolClient;
use crate::types::SessionState;

/// Session represents one connection between the bridge and one account.
///
/// `qr_code` is only set while connecting and `connected_at` only while
/// connected; the `apply_*` transitions keep both in step with `state`.
#[derive(Clone)]
pub struct Session {
    /// Caller-supplied session identifier.
    pub id: String,
    /// Distinguishes successive starts of the same identifier.
    pub incarnation: Uuid,
    pub state: SessionState,
    /// Latest QR image (PNG).
    pub qr_code: Option<Vec<u8>>,
    pub connected_at: Option<DateTime<Utc>>,
    /// Underlying client owned by this session.
    pub client: Arc<dyn ProtocolClient>,
    tasks: Vec<Arc<AbortHandle>>,
}

impl Session {
    /// Create a disconnected session around a freshly built client.
    pub fn new(id: impl Into<String>, client: Arc<dyn ProtocolClient>) -> Self {
        Self {
            id: id.into(),
            incarnation: Uuid::new_v4(),
            state: SessionState::Disconnected,
            qr_code: None,
            connected_at: None,
            client,
            tasks: Vec::new(),
        }
    }

    /// A new QR replaces any previous one.
    pub fn apply_qr(&mut self, image: Vec<u8>) {
        self.state = SessionState::Connecting;
        self.qr_code = Some(image);
        self.connected_at = None;
    }

    pub fn apply_connected(&mut self, at: DateTime<Utc>) {
        self.state = SessionState::Connected;
        self.qr_code = None;
        self.connected_at = Some(at);
    }

    pub fn apply_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.qr_code = None;
        self.connected_at = None;
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Track a background task so it can be stopped with the session.
    pub fn attach_task(&mut self, task: AbortHandle) {
        self.tasks.push(Arc::new(task));
    }

    /// Stop every background task attached to this session.
    pub fn abort_tasks(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            connected_at: self.connected_at.map(unix_seconds),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("incarnation", &self.incarnation)
            .field("state", &self.state)
            .field("qr_code", &self.qr_code.as_ref().map(Vec::len))
            .field("connected_at", &self.connected_at)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

/// Snapshot returned by status queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Fractional unix seconds.
    pub connected_at: Option<f64>,
}

/// Fractional unix seconds with millisecond precision.
pub fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MemoryClient;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    fn session() -> Session {
        let (tx, _rx) = mpsc::unbounded_channel();
        Session::new("s1", Arc::new(MemoryClient::new("s1", tx)))
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session = session();
        assert_eq!(session.state, SessionState::Disconnected);
        assert!(session.qr_code.is_none());
        assert!(session.connected_at.is_none());
    }

    #[test]
    fn test_transitions_keep_fields_consistent() {
        let mut session = session();

        session.apply_qr(vec![1, 2, 3]);
        assert_eq!(session.state, SessionState::Connecting);
        assert!(session.qr_code.is_some());

        session.apply_qr(vec![4]);
        assert_eq!(session.qr_code.as_deref(), Some(&[4u8][..]));

        session.apply_connected(Utc::now());
        assert!(session.is_connected());
        assert!(session.qr_code.is_none());
        assert!(session.connected_at.is_some());

        session.apply_disconnected();
        assert_eq!(session.state, SessionState::Disconnected);
        assert!(session.connected_at.is_none());
    }

    #[test]
    fn test_status_reports_fractional_seconds() {
        let mut session = session();
        let at = Utc.timestamp_millis_opt(1_700_000_000_250).unwrap();
        session.apply_connected(at);

        let status = session.status();
        assert_eq!(status.state, SessionState::Connected);
        assert_eq!(status.connected_at, Some(1_700_000_000.25));
    }

    #[test]
    fn test_incarnations_differ() {
        assert_ne!(session().incarnation, session().incarnation);
    }
}
