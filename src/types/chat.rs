//! Chat, contact and message shapes.
//!
//! The first group mirrors what an underlying protocol client reports; the
//! summaries are what the bridge hands back to callers.

use serde::{Deserialize, Serialize};

use crate::types::{DeliveryState, Direction};

/// Name used when neither the chat nor the contact carries one.
pub const UNKNOWN_CONTACT: &str = "Unknown";

/// A chat as reported by the underlying client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chat {
    /// Serialized chat id, e.g. `123@c.us` or `456@g.us`.
    pub id: String,
    pub name: Option<String>,
    pub is_group: bool,
    pub unread_count: u32,
    pub timestamp: i64,
    pub last_message: Option<String>,
}

/// A contact as reported by the underlying client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    pub id: String,
    /// Name saved in the address book.
    pub name: Option<String>,
    /// Name the contact chose for themselves.
    pub pushname: Option<String>,
    pub number: String,
}

impl Contact {
    /// Address-book name, then push name, then number.
    pub fn display_name(&self) -> String {
        non_empty(self.name.as_deref())
            .or_else(|| non_empty(self.pushname.as_deref()))
            .or_else(|| non_empty(Some(self.number.as_str())))
            .unwrap_or(UNKNOWN_CONTACT)
            .to_string()
    }
}

/// A message as reported by the underlying client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    /// Chat the message belongs to.
    pub from: String,
    /// Sender inside a group chat. `None` for direct chats.
    pub author: Option<String>,
    pub body: String,
    pub timestamp: i64,
    pub from_me: bool,
    pub ack: i64,
}

impl RawMessage {
    /// Contact id of whoever wrote the message.
    pub fn sender(&self) -> &str {
        self.author.as_deref().unwrap_or(&self.from)
    }
}

/// Chat entry returned by chat listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "unread")]
    pub unread_count: u32,
    pub timestamp: i64,
    #[serde(rename = "last_message")]
    pub last_message_body: String,
}

/// Message entry returned by message listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub chat_id: String,
    #[serde(rename = "content")]
    pub body: String,
    pub timestamp: i64,
    pub direction: Direction,
    #[serde(rename = "state")]
    pub delivery_state: DeliveryState,
}

impl From<&RawMessage> for MessageSummary {
    fn from(message: &RawMessage) -> Self {
        Self {
            id: message.id.clone(),
            chat_id: message.from.clone(),
            body: message.body.clone(),
            timestamp: message.timestamp,
            direction: Direction::from_me(message.from_me),
            delivery_state: DeliveryState::from_ack(message.ack),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
