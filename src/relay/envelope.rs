//! JSON envelopes posted to the relay target.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::store::unix_seconds;
use crate::types::{AckStatus, NormalizedEvent, SessionState};

/// Body of one webhook call, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebhookEnvelope {
    ConnectionUpdate {
        session_id: String,
        status: SessionState,
        /// Base64 PNG, without a data-URI prefix.
        #[serde(skip_serializing_if = "Option::is_none")]
        qr_code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        connected_at: Option<f64>,
    },
    Message {
        session_id: String,
        message: MessagePayload,
    },
    StatusUpdate {
        session_id: String,
        status: AckPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagePayload {
    pub id: String,
    pub chat_id: String,
    pub contact_name: String,
    pub content: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AckPayload {
    pub message_id: String,
    pub status: AckStatus,
}

impl From<&NormalizedEvent> for WebhookEnvelope {
    fn from(event: &NormalizedEvent) -> Self {
        let session_id = event.session_id().to_string();
        match event {
            NormalizedEvent::QrIssued { image, .. } => WebhookEnvelope::ConnectionUpdate {
                session_id,
                status: SessionState::Connecting,
                qr_code: Some(STANDARD.encode(image)),
                connected_at: None,
            },
            NormalizedEvent::Connected { connected_at, .. } => WebhookEnvelope::ConnectionUpdate {
                session_id,
                status: SessionState::Connected,
                qr_code: None,
                connected_at: Some(unix_seconds(*connected_at)),
            },
            NormalizedEvent::Disconnected { .. } => WebhookEnvelope::ConnectionUpdate {
                session_id,
                status: SessionState::Disconnected,
                qr_code: None,
                connected_at: None,
            },
            NormalizedEvent::MessageReceived {
                message_id,
                chat_id,
                contact_name,
                body,
                timestamp,
                ..
            } => WebhookEnvelope::Message {
                session_id,
                message: MessagePayload {
                    id: message_id.clone(),
                    chat_id: chat_id.clone(),
                    contact_name: contact_name.clone(),
                    content: body.clone(),
                    timestamp: *timestamp,
                },
            },
            NormalizedEvent::AckChanged {
                message_id,
                ack_status,
                ..
            } => WebhookEnvelope::StatusUpdate {
                session_id,
                status: AckPayload {
                    message_id: message_id.clone(),
                    status: *ack_status,
                },
            },
        }
    }
}
