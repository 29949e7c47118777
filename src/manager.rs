//! Session lifecycle manager.
//!
//! Owns the session store, starts one lifecycle task per session and keeps
//! the state machine
//!
//! ```text
//! disconnected --QrIssued--> connecting --Connected--> connected
//!       ^                      |    ^                      |
//!       |                      +----+ (QR refresh)         |
//!       +-------------------- Disconnected <---------------+
//! ```
//!
//! State only changes in response to normalized events. Every event is
//! relayed after the store has been updated, by one relay task per session
//! so the relay target sees events in arrival order. A `Disconnected` event
//! removes the record once every queued relay attempt has finished.

use std::sync::Arc;

use log::info;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::adapter::{ClientAdapter, ClientHandle};
use crate::config::DEFAULT_MESSAGE_LIMIT;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::ClientFactory;
use crate::relay::{relay_logged, EventSink};
use crate::store::{MemoryStore, SessionStatus, SessionStore};
use crate::types::{ChatSummary, MessageSummary, NormalizedEvent};

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    adapter: ClientAdapter,
    sink: Arc<dyn EventSink>,
    default_message_limit: usize,
}

impl SessionManager {
    /// Create a manager with an empty in-memory store.
    pub fn new(factory: Arc<dyn ClientFactory>, sink: Arc<dyn EventSink>) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), factory, sink)
    }

    pub fn with_store(
        store: Arc<dyn SessionStore>,
        factory: Arc<dyn ClientFactory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            adapter: ClientAdapter::new(store.clone(), factory),
            store,
            sink,
            default_message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    /// Override the number of messages listed when no limit is given.
    pub fn with_message_limit(mut self, limit: usize) -> Self {
        self.default_message_limit = limit;
        self
    }

    /// Create the session's client and start following its events.
    pub fn start(&self, session_id: &str) -> BridgeResult<()> {
        if session_id.is_empty() {
            return Err(BridgeError::MissingParameters);
        }

        let handle = self.adapter.create(session_id)?;
        let incarnation = handle.incarnation;
        let task = tokio::spawn(run_lifecycle(self.store.clone(), self.sink.clone(), handle));
        self.store
            .update(session_id, incarnation, &mut |s| s.attach_task(task.abort_handle()));

        info!("started session {}", session_id);
        Ok(())
    }

    /// Latest QR image (PNG) of a session that is waiting to be paired.
    pub fn qr_code(&self, session_id: &str) -> BridgeResult<Vec<u8>> {
        self.store
            .get(session_id)
            .ok_or(BridgeError::NotFound)?
            .qr_code
            .ok_or(BridgeError::NotAvailable)
    }

    pub fn status(&self, session_id: &str) -> BridgeResult<SessionStatus> {
        self.store
            .get(session_id)
            .map(|s| s.status())
            .ok_or(BridgeError::NotFound)
    }

    /// Identifiers of every live session.
    pub fn sessions(&self) -> Vec<String> {
        self.store.ids()
    }

    /// Send a text message, returning its id.
    pub async fn send(&self, session_id: &str, chat_id: &str, body: &str) -> BridgeResult<String> {
        if session_id.is_empty() || chat_id.is_empty() || body.is_empty() {
            return Err(BridgeError::MissingParameters);
        }
        self.adapter.send_message(session_id, chat_id, body).await
    }

    pub async fn list_chats(&self, session_id: &str) -> BridgeResult<Vec<ChatSummary>> {
        self.adapter.get_chats(session_id).await
    }

    pub async fn list_messages(
        &self,
        session_id: &str,
        chat_id: &str,
        limit: Option<usize>,
        before: Option<i64>,
    ) -> BridgeResult<Vec<MessageSummary>> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(self.default_message_limit);
        self.adapter
            .fetch_messages(session_id, chat_id, limit, before)
            .await
    }

    pub async fn mark_read(&self, session_id: &str, chat_id: &str) -> BridgeResult<()> {
        if chat_id.is_empty() {
            return Err(BridgeError::MissingParameters);
        }
        self.adapter.mark_read(session_id, chat_id).await
    }

    /// Log the session out and forget it. No connection update is relayed.
    pub async fn logout(&self, session_id: &str) -> BridgeResult<()> {
        self.adapter.logout(session_id).await
    }
}

/// Apply one session's events in arrival order until it disconnects or its
/// record disappears.
async fn run_lifecycle(
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn EventSink>,
    handle: ClientHandle,
) {
    let ClientHandle {
        session_id,
        incarnation,
        mut events,
    } = handle;

    let (queue, pending) = mpsc::unbounded_channel();
    let relay = tokio::spawn(relay_in_order(sink, pending));
    store.update(&session_id, incarnation, &mut |s| {
        s.attach_task(relay.abort_handle())
    });

    while let Some(event) = events.recv().await {
        if let NormalizedEvent::Disconnected { .. } = event {
            store.update(&session_id, incarnation, &mut |s| s.apply_disconnected());
            info!("session {} disconnected", session_id);
            let _ = queue.send(event);
            drop(queue);
            let _ = relay.await;
            store.remove_incarnation(&session_id, incarnation);
            break;
        }

        if !apply(store.as_ref(), &session_id, incarnation, &event) {
            break;
        }
        if queue.send(event).is_err() {
            break;
        }
    }
}

/// Deliver queued events one at a time, oldest first.
async fn relay_in_order(
    sink: Arc<dyn EventSink>,
    mut pending: mpsc::UnboundedReceiver<NormalizedEvent>,
) {
    while let Some(event) = pending.recv().await {
        relay_logged(sink.as_ref(), &event).await;
    }
}

/// Update the record for `event`. Returns `false` when the record is gone
/// or belongs to a newer incarnation.
fn apply(
    store: &dyn SessionStore,
    session_id: &str,
    incarnation: Uuid,
    event: &NormalizedEvent,
) -> bool {
    match event {
        NormalizedEvent::QrIssued { image, .. } => {
            let applied =
                store.update(session_id, incarnation, &mut |s| s.apply_qr(image.clone()));
            if applied {
                info!("session {} is connecting, QR issued", session_id);
            }
            applied
        }
        NormalizedEvent::Connected { connected_at, .. } => {
            let applied =
                store.update(session_id, incarnation, &mut |s| s.apply_connected(*connected_at));
            if applied {
                info!("session {} is connected", session_id);
            }
            applied
        }
        _ => store
            .get(session_id)
            .is_some_and(|s| s.incarnation == incarnation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::protocol::MemoryClientFactory;
    use crate::relay::MemorySink;
    use crate::types::SessionState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Holds back its first delivery so later events have a chance to overtake it.
    #[derive(Default)]
    struct SlowFirstSink {
        inner: MemorySink,
        delayed: AtomicBool,
    }

    #[async_trait]
    impl EventSink for SlowFirstSink {
        async fn relay(&self, event: &NormalizedEvent) -> Result<(), RelayError> {
            if !self.delayed.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.relay(event).await
        }
    }

    fn manager() -> (SessionManager, Arc<MemoryClientFactory>, Arc<MemorySink>) {
        let factory = Arc::new(MemoryClientFactory::new());
        let sink = Arc::new(MemorySink::new());
        let manager = SessionManager::new(factory.clone(), sink.clone());
        (manager, factory, sink)
    }

    #[tokio::test]
    async fn test_start_requires_identifier() {
        let (manager, _, _) = manager();
        assert!(matches!(
            manager.start(""),
            Err(BridgeError::MissingParameters)
        ));
    }

    #[tokio::test]
    async fn test_fresh_session_has_no_qr() {
        let (manager, _, _) = manager();
        manager.start("s1").unwrap();

        let status = manager.status("s1").unwrap();
        assert_eq!(status.state, SessionState::Disconnected);
        assert!(status.connected_at.is_none());
        assert!(matches!(
            manager.qr_code("s1"),
            Err(BridgeError::NotAvailable)
        ));
        assert!(matches!(manager.qr_code("s2"), Err(BridgeError::NotFound)));
        assert_eq!(manager.sessions(), ["s1"]);
    }

    #[tokio::test]
    async fn test_send_validates_parameters_first() {
        let (manager, _, _) = manager();
        assert!(matches!(
            manager.send("s1", "", "hi").await,
            Err(BridgeError::MissingParameters)
        ));
        assert!(matches!(
            manager.send("s1", "1@c.us", "hi").await,
            Err(BridgeError::NotConnected)
        ));
        assert!(matches!(
            manager.mark_read("s1", "").await,
            Err(BridgeError::MissingParameters)
        ));
    }

    #[tokio::test]
    async fn test_relay_failure_does_not_undo_transition() {
        let (manager, factory, sink) = manager();
        sink.fail_with(crate::error::RelayError::DeliveryFailed("down".into()));
        manager.start("s1").unwrap();
        factory.client("s1").unwrap().qr("QR123");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while sink.attempts() == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.attempts(), 1);
        assert_eq!(manager.status("s1").unwrap().state, SessionState::Connecting);
        assert!(manager.qr_code("s1").is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_relay_keeps_arrival_order() {
        let factory = Arc::new(MemoryClientFactory::new());
        let sink = Arc::new(SlowFirstSink::default());
        let manager = SessionManager::new(factory.clone(), sink.clone());
        manager.start("s1").unwrap();
        let client = factory.client("s1").unwrap();

        client.qr("QR123");
        client.ready();
        client.disconnect("LOGOUT");

        sink.inner
            .wait_for(Duration::from_secs(2), |e| {
                matches!(e, NormalizedEvent::Disconnected { .. })
            })
            .await
            .expect("disconnect relayed");
        let kinds: Vec<_> = sink.inner.events().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, ["qr_issued", "connected", "disconnected"]);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while manager.status("s1").is_ok() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(manager.status("s1"), Err(BridgeError::NotFound)));
    }
}
