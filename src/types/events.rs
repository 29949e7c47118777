//! Event types flowing through the bridge.
//!
//! [`RawEvent`]s are emitted by an underlying protocol client; the adapter
//! turns them into [`NormalizedEvent`]s that drive the session lifecycle and
//! are relayed to the business application.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::RawMessage;

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery acknowledgment reported for a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Pending,
    Sent,
    Delivered,
    Read,
}

impl AckStatus {
    /// Map a protocol ack code. Codes 0 and 1 both read as pending, as does
    /// anything unknown.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => AckStatus::Sent,
            3 => AckStatus::Delivered,
            4 => AckStatus::Read,
            _ => AckStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Pending => "pending",
            AckStatus::Sent => "sent",
            AckStatus::Delivered => "delivered",
            AckStatus::Read => "read",
        }
    }
}

/// Delivery state reported on fetched message history.
///
/// Deliberately separate from [`AckStatus`]: history listings never report
/// pending, everything below delivered reads as sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Sent,
    Delivered,
    Read,
}

impl DeliveryState {
    pub fn from_ack(code: i64) -> Self {
        match code {
            3 => DeliveryState::Delivered,
            4 => DeliveryState::Read,
            _ => DeliveryState::Sent,
        }
    }
}

/// Direction of a message relative to the session's own account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn from_me(from_me: bool) -> Self {
        if from_me {
            Direction::Outgoing
        } else {
            Direction::Incoming
        }
    }
}

/// Signal emitted by an underlying protocol client.
#[derive(Debug, Clone)]
pub enum RawEvent {
    /// A pairing payload to be shown as a QR code. May already be a
    /// `data:image/png;base64,` URL.
    Qr(String),
    /// Pairing finished and the client is usable.
    Ready,
    /// An inbound message.
    Message(RawMessage),
    /// Ack code changed for a previously sent message.
    Ack { message_id: String, ack: i64 },
    /// The client lost its session, or failed to initialize.
    Disconnected { reason: Option<String> },
}

/// Event consumed by the lifecycle manager and forwarded to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedEvent {
    QrIssued {
        session_id: String,
        image: Vec<u8>,
    },
    Connected {
        session_id: String,
        connected_at: DateTime<Utc>,
    },
    MessageReceived {
        session_id: String,
        message_id: String,
        chat_id: String,
        contact_name: String,
        body: String,
        timestamp: i64,
    },
    AckChanged {
        session_id: String,
        message_id: String,
        ack_status: AckStatus,
    },
    Disconnected {
        session_id: String,
    },
}

impl NormalizedEvent {
    pub fn session_id(&self) -> &str {
        match self {
            NormalizedEvent::QrIssued { session_id, .. }
            | NormalizedEvent::Connected { session_id, .. }
            | NormalizedEvent::MessageReceived { session_id, .. }
            | NormalizedEvent::AckChanged { session_id, .. }
            | NormalizedEvent::Disconnected { session_id } => session_id,
        }
    }

    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::QrIssued { .. } => "qr_issued",
            NormalizedEvent::Connected { .. } => "connected",
            NormalizedEvent::MessageReceived { .. } => "message_received",
            NormalizedEvent::AckChanged { .. } => "ack_changed",
            NormalizedEvent::Disconnected { .. } => "disconnected",
        }
    }
}
