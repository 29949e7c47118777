//! Client adapter: one underlying protocol client per session.
//!
//! Creates clients through a [`ClientFactory`], turns their raw signals into
//! [`NormalizedEvent`]s on a per-session channel, and exposes the outbound
//! operations (send, chats, history, read, logout).

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use log::{error, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{BridgeError, BridgeResult};
use crate::protocol::qr::{qr_image, QRError};
use crate::protocol::{ClientError, ClientFactory, ProtocolClient, RawEventSender};
use crate::store::{Session, SessionStore};
use crate::types::{
    AckStatus, Chat, ChatSummary, MessageSummary, NormalizedEvent, RawEvent, UNKNOWN_CONTACT,
};

/// A raw signal that could not be normalized. The signal is dropped.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Qr(#[from] QRError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Normalized event stream of one freshly created session.
pub struct ClientHandle {
    pub session_id: String,
    pub incarnation: Uuid,
    pub events: mpsc::UnboundedReceiver<NormalizedEvent>,
}

pub struct ClientAdapter {
    store: Arc<dyn SessionStore>,
    factory: Arc<dyn ClientFactory>,
}

impl ClientAdapter {
    pub fn new(store: Arc<dyn SessionStore>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { store, factory }
    }

    /// Build a client for `session_id`, register its record and start
    /// initializing it in the background.
    ///
    /// Initialization failures are reported as a `Disconnected` event on the
    /// returned handle, not as an error here.
    pub fn create(&self, session_id: &str) -> BridgeResult<ClientHandle> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let session = self.store.insert_with(session_id, &mut || {
            Session::new(session_id, self.factory.create(session_id, raw_tx.clone()))
        })?;
        let incarnation = session.incarnation;
        let client = session.client;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let normalizer = tokio::spawn(normalize_stream(
            client.clone(),
            session_id.to_string(),
            raw_rx,
            event_tx,
        ));
        let init = tokio::spawn(initialize(client, session_id.to_string(), raw_tx));
        self.store.update(session_id, incarnation, &mut |s| {
            s.attach_task(normalizer.abort_handle());
            s.attach_task(init.abort_handle());
        });

        Ok(ClientHandle {
            session_id: session_id.to_string(),
            incarnation,
            events: event_rx,
        })
    }

    /// Send a text message. The underlying client is only called for
    /// connected sessions.
    pub async fn send_message(
        &self,
        session_id: &str,
        chat_id: &str,
        body: &str,
    ) -> BridgeResult<String> {
        let client = self.connected_client(session_id)?;
        client.send_message(chat_id, body).await.map_err(|e| {
            error!("failed to send message for session {}: {}", session_id, e);
            BridgeError::SendFailed(e.to_string())
        })
    }

    /// List chats, named with the same group/contact rule as inbound messages.
    pub async fn get_chats(&self, session_id: &str) -> BridgeResult<Vec<ChatSummary>> {
        let client = self.connected_client(session_id)?;
        let chats = client.get_chats().await.map_err(client_failed)?;

        try_join_all(chats.into_iter().map(|chat| {
            let client = client.clone();
            async move {
                let name = resolve_name(client.as_ref(), &chat, &chat.id).await?;
                Ok::<_, ClientError>(ChatSummary {
                    id: chat.id,
                    name,
                    unread_count: chat.unread_count,
                    timestamp: chat.timestamp,
                    last_message_body: chat.last_message.unwrap_or_default(),
                })
            }
        }))
        .await
        .map_err(client_failed)
    }

    /// Most recent `limit` messages of a chat. With `before`, only messages
    /// strictly older than that unix timestamp are kept.
    pub async fn fetch_messages(
        &self,
        session_id: &str,
        chat_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> BridgeResult<Vec<MessageSummary>> {
        let client = self.connected_client(session_id)?;
        client.get_chat_by_id(chat_id).await.map_err(client_failed)?;
        let messages = client
            .fetch_messages(chat_id, limit, before)
            .await
            .map_err(client_failed)?;

        Ok(messages.iter().map(MessageSummary::from).collect())
    }

    pub async fn mark_read(&self, session_id: &str, chat_id: &str) -> BridgeResult<()> {
        let client = self.connected_client(session_id)?;
        client.get_chat_by_id(chat_id).await.map_err(client_failed)?;
        client.send_seen(chat_id).await.map_err(client_failed)
    }

    /// Release the handle and log the account out.
    ///
    /// The record is gone before the underlying client is contacted, so a
    /// concurrent logout sees `NotFound`. The handle is released even when
    /// the underlying logout fails.
    pub async fn logout(&self, session_id: &str) -> BridgeResult<()> {
        let session = self
            .store
            .remove(session_id)
            .ok_or(BridgeError::NotFound)?;
        session.abort_tasks();
        info!("logging out session {}", session_id);

        session.client.logout().await.map_err(|e| {
            warn!("logout failed for session {}: {}", session_id, e);
            client_failed(e)
        })
    }

    fn connected_client(&self, session_id: &str) -> BridgeResult<Arc<dyn ProtocolClient>> {
        match self.store.get(session_id) {
            Some(session) if session.is_connected() => Ok(session.client),
            _ => Err(BridgeError::NotConnected),
        }
    }
}

/// Turn one raw signal into a normalized event.
pub async fn normalize(
    client: &dyn ProtocolClient,
    session_id: &str,
    raw: RawEvent,
) -> Result<NormalizedEvent, NormalizeError> {
    let session_id = session_id.to_string();
    let event = match raw {
        RawEvent::Qr(payload) => NormalizedEvent::QrIssued {
            session_id,
            image: qr_image(&payload)?,
        },
        RawEvent::Ready => NormalizedEvent::Connected {
            session_id,
            connected_at: Utc::now(),
        },
        RawEvent::Message(message) => {
            let chat = client.get_chat_by_id(&message.from).await?;
            let contact_name = resolve_name(client, &chat, message.sender()).await?;
            NormalizedEvent::MessageReceived {
                session_id,
                message_id: message.id,
                chat_id: message.from,
                contact_name,
                body: message.body,
                timestamp: message.timestamp,
            }
        }
        RawEvent::Ack { message_id, ack } => NormalizedEvent::AckChanged {
            session_id,
            message_id,
            ack_status: AckStatus::from_code(ack),
        },
        RawEvent::Disconnected { reason } => {
            if let Some(reason) = reason {
                info!("session {} disconnected: {}", session_id, reason);
            }
            NormalizedEvent::Disconnected { session_id }
        }
    };
    Ok(event)
}

/// Group chats go by the group name, direct chats by the contact's
/// display name.
async fn resolve_name(
    client: &dyn ProtocolClient,
    chat: &Chat,
    contact_id: &str,
) -> Result<String, ClientError> {
    if chat.is_group {
        return Ok(chat
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_CONTACT.to_string()));
    }
    Ok(client.get_contact_by_id(contact_id).await?.display_name())
}

async fn normalize_stream(
    client: Arc<dyn ProtocolClient>,
    session_id: String,
    mut raw: mpsc::UnboundedReceiver<RawEvent>,
    events: mpsc::UnboundedSender<NormalizedEvent>,
) {
    while let Some(event) = raw.recv().await {
        let last = matches!(event, RawEvent::Disconnected { .. });
        match normalize(client.as_ref(), &session_id, event).await {
            Ok(normalized) => {
                if events.send(normalized).is_err() {
                    break;
                }
            }
            Err(e) => warn!("dropping raw event for session {}: {}", session_id, e),
        }
        if last {
            break;
        }
    }
}

async fn initialize(client: Arc<dyn ProtocolClient>, session_id: String, raw: RawEventSender) {
    info!("initializing client for session {}", session_id);
    if let Err(e) = client.initialize().await {
        error!("client initialization failed for session {}: {}", session_id, e);
        let _ = raw.send(RawEvent::Disconnected {
            reason: Some(e.to_string()),
        });
    }
}

fn client_failed(e: ClientError) -> BridgeError {
    BridgeError::ClientFailed(e.to_string())
}
