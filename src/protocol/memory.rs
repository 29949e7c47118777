//! In-memory protocol client for development and testing.
//!
//! No network is involved: chats, contacts and history are seeded by hand and
//! raw signals are injected with [`MemoryClient::emit`] or the shortcuts
//! around it. For production use, plug in a [`ClientFactory`] backed by a real
//! WhatsApp connection.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use log::debug;

use crate::protocol::{ClientError, ClientFactory, ProtocolClient, RawEventSender};
use crate::types::{Chat, Contact, RawEvent, RawMessage};

const GROUP_SERVER: &str = "@g.us";

#[derive(Default)]
struct MemoryState {
    ready: bool,
    initialized: bool,
    logged_out: bool,
    chats: HashMap<String, Chat>,
    contacts: HashMap<String, Contact>,
    history: HashMap<String, Vec<RawMessage>>,
    sent: Vec<RawMessage>,
    seen: Vec<String>,
    fail_initialize: Option<String>,
    fail_send: Option<String>,
    fail_logout: Option<String>,
}

/// Protocol client whose whole world lives in memory.
pub struct MemoryClient {
    session_id: String,
    events: RawEventSender,
    pairing_qr: bool,
    state: RwLock<MemoryState>,
}

impl MemoryClient {
    /// Create a client reporting its signals on `events`.
    pub fn new(session_id: impl Into<String>, events: RawEventSender) -> Self {
        Self {
            session_id: session_id.into(),
            events,
            pairing_qr: false,
            state: RwLock::new(MemoryState::default()),
        }
    }

    /// Emit a pairing QR as soon as the client is initialized.
    pub fn with_pairing_qr(mut self) -> Self {
        self.pairing_qr = true;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Inject a raw signal. Returns `false` once nobody listens anymore.
    pub fn emit(&self, event: RawEvent) -> bool {
        match &event {
            RawEvent::Ready => self.write_state().ready = true,
            RawEvent::Disconnected { .. } => self.write_state().ready = false,
            _ => {}
        }
        self.events.send(event).is_ok()
    }

    /// Emit a pairing payload.
    pub fn qr(&self, payload: impl Into<String>) -> bool {
        self.emit(RawEvent::Qr(payload.into()))
    }

    /// Finish pairing.
    pub fn ready(&self) -> bool {
        self.emit(RawEvent::Ready)
    }

    /// Drop the connection from the protocol side.
    pub fn disconnect(&self, reason: impl Into<String>) -> bool {
        self.emit(RawEvent::Disconnected {
            reason: Some(reason.into()),
        })
    }

    /// Deliver an inbound message: records it in history, opens the chat if
    /// needed, then emits the raw signal.
    pub fn receive(&self, message: RawMessage) -> bool {
        {
            let mut state = self.write_state();
            let chat = state
                .chats
                .entry(message.from.clone())
                .or_insert_with(|| Chat {
                    id: message.from.clone(),
                    is_group: message.from.ends_with(GROUP_SERVER),
                    ..Default::default()
                });
            chat.unread_count += 1;
            chat.timestamp = message.timestamp;
            chat.last_message = Some(message.body.clone());
            state
                .history
                .entry(message.from.clone())
                .or_default()
                .push(message.clone());
        }
        self.emit(RawEvent::Message(message))
    }

    /// Report an ack code for a message.
    pub fn ack(&self, message_id: impl Into<String>, ack: i64) -> bool {
        self.emit(RawEvent::Ack {
            message_id: message_id.into(),
            ack,
        })
    }

    pub fn add_chat(&self, chat: Chat) {
        self.write_state().chats.insert(chat.id.clone(), chat);
    }

    pub fn add_contact(&self, contact: Contact) {
        self.write_state()
            .contacts
            .insert(contact.id.clone(), contact);
    }

    /// Seed history without emitting anything.
    pub fn add_history(&self, message: RawMessage) {
        self.write_state()
            .history
            .entry(message.from.clone())
            .or_default()
            .push(message);
    }

    pub fn fail_initialize_with(&self, reason: impl Into<String>) {
        self.write_state().fail_initialize = Some(reason.into());
    }

    pub fn fail_sends_with(&self, reason: impl Into<String>) {
        self.write_state().fail_send = Some(reason.into());
    }

    pub fn fail_logout_with(&self, reason: impl Into<String>) {
        self.write_state().fail_logout = Some(reason.into());
    }

    /// Messages sent through this client, in order.
    pub fn sent_messages(&self) -> Vec<RawMessage> {
        self.read_state().sent.clone()
    }

    /// Chats marked as seen, in order.
    pub fn seen_chats(&self) -> Vec<String> {
        self.read_state().seen.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.read_state().initialized
    }

    pub fn is_logged_out(&self) -> bool {
        self.read_state().logged_out
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProtocolClient for MemoryClient {
    async fn initialize(&self) -> Result<(), ClientError> {
        {
            let mut state = self.write_state();
            if let Some(reason) = state.fail_initialize.clone() {
                return Err(ClientError::InitializationFailed(reason));
            }
            state.initialized = true;
        }

        if self.pairing_qr {
            // ref,session: enough to make every code unique
            let payload = format!("{:X},{}", rand::random::<u64>(), self.session_id);
            self.qr(payload);
        }
        debug!("memory client initialized for session {}", self.session_id);
        Ok(())
    }

    async fn send_message(&self, chat_id: &str, body: &str) -> Result<String, ClientError> {
        let mut state = self.write_state();
        if let Some(reason) = state.fail_send.clone() {
            return Err(ClientError::Transport(reason));
        }
        if !state.ready {
            return Err(ClientError::NotReady);
        }

        let message = RawMessage {
            id: format!("3EB0{:X}", rand::random::<u64>()),
            from: chat_id.to_string(),
            author: None,
            body: body.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            from_me: true,
            ack: 1,
        };
        state
            .history
            .entry(chat_id.to_string())
            .or_default()
            .push(message.clone());
        state.sent.push(message.clone());
        Ok(message.id)
    }

    async fn get_chats(&self) -> Result<Vec<Chat>, ClientError> {
        let state = self.read_state();
        let mut chats: Vec<Chat> = state.chats.values().cloned().collect();
        chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        Ok(chats)
    }

    async fn get_chat_by_id(&self, chat_id: &str) -> Result<Chat, ClientError> {
        self.read_state()
            .chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| ClientError::ChatNotFound(chat_id.to_string()))
    }

    async fn get_contact_by_id(&self, contact_id: &str) -> Result<Contact, ClientError> {
        self.read_state()
            .contacts
            .get(contact_id)
            .cloned()
            .ok_or_else(|| ClientError::ContactNotFound(contact_id.to_string()))
    }

    async fn fetch_messages(
        &self,
        chat_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<RawMessage>, ClientError> {
        let state = self.read_state();
        let history: Vec<&RawMessage> = state
            .history
            .get(chat_id)
            .map(|h| {
                h.iter()
                    .filter(|m| before.map_or(true, |cursor| m.timestamp < cursor))
                    .collect()
            })
            .unwrap_or_default();
        let start = history.len().saturating_sub(limit);
        Ok(history[start..].iter().map(|m| (*m).clone()).collect())
    }

    async fn send_seen(&self, chat_id: &str) -> Result<(), ClientError> {
        let mut state = self.write_state();
        let chat = state
            .chats
            .get_mut(chat_id)
            .ok_or_else(|| ClientError::ChatNotFound(chat_id.to_string()))?;
        chat.unread_count = 0;
        state.seen.push(chat_id.to_string());
        Ok(())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        let mut state = self.write_state();
        if let Some(reason) = state.fail_logout.clone() {
            return Err(ClientError::Transport(reason));
        }
        state.ready = false;
        state.logged_out = true;
        Ok(())
    }
}

/// Factory handing out [`MemoryClient`]s and remembering the latest one per
/// session so callers can drive it.
#[derive(Default)]
pub struct MemoryClientFactory {
    clients: RwLock<HashMap<String, Arc<MemoryClient>>>,
    pairing_qr: bool,
}

impl MemoryClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clients built by this factory emit a QR as soon as they initialize.
    pub fn with_pairing_qr(mut self) -> Self {
        self.pairing_qr = true;
        self
    }

    /// Latest client created for `session_id`.
    pub fn client(&self, session_id: &str) -> Option<Arc<MemoryClient>> {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(session_id)
            .cloned()
    }

    /// Number of distinct sessions a client was created for.
    pub fn created(&self) -> usize {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl ClientFactory for MemoryClientFactory {
    fn create(&self, session_id: &str, events: RawEventSender) -> Arc<dyn ProtocolClient> {
        let mut client = MemoryClient::new(session_id, events);
        if self.pairing_qr {
            client = client.with_pairing_qr();
        }
        let client = Arc::new(client);
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.to_string(), client.clone());
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn client() -> (MemoryClient, mpsc::UnboundedReceiver<RawEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MemoryClient::new("s1", tx), rx)
    }

    #[tokio::test]
    async fn test_send_requires_ready() {
        let (client, _rx) = client();
        assert_eq!(
            client.send_message("1@c.us", "hi").await,
            Err(ClientError::NotReady)
        );

        client.ready();
        let id = client.send_message("1@c.us", "hi").await.unwrap();
        assert!(id.starts_with("3EB0"));
        assert_eq!(client.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_opens_chat_and_emits() {
        let (client, mut rx) = client();
        client.receive(RawMessage {
            id: "M1".into(),
            from: "42@g.us".into(),
            author: Some("7@c.us".into()),
            body: "hello".into(),
            timestamp: 10,
            ..Default::default()
        });

        let chat = client.get_chat_by_id("42@g.us").await.unwrap();
        assert!(chat.is_group);
        assert_eq!(chat.unread_count, 1);
        assert!(matches!(rx.recv().await, Some(RawEvent::Message(m)) if m.id == "M1"));
    }

    #[tokio::test]
    async fn test_fetch_returns_latest_messages() {
        let (client, _rx) = client();
        for i in 0..5 {
            client.add_history(RawMessage {
                id: format!("M{i}"),
                from: "1@c.us".into(),
                timestamp: i,
                ..Default::default()
            });
        }
        let messages = client.fetch_messages("1@c.us", 2, None).await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["M3", "M4"]);

        let messages = client.fetch_messages("1@c.us", 2, Some(3)).await.unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["M1", "M2"]);
    }

    #[tokio::test]
    async fn test_initialize_emits_pairing_qr() {
        let (client, mut rx) = client();
        let client = client.with_pairing_qr();
        client.initialize().await.unwrap();
        assert!(client.is_initialized());
        assert!(matches!(rx.recv().await, Some(RawEvent::Qr(p)) if p.ends_with(",s1")));
    }

    #[tokio::test]
    async fn test_initialize_failure() {
        let (client, _rx) = client();
        client.fail_initialize_with("browser crashed");
        assert!(matches!(
            client.initialize().await,
            Err(ClientError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_factory_tracks_clients() {
        let factory = MemoryClientFactory::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        factory.create("s1", tx);
        assert!(factory.client("s1").is_some());
        assert!(factory.client("s2").is_none());
        assert_eq!(factory.created(), 1);
    }
}
