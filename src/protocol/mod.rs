//! Underlying protocol client capability.
//!
//! The bridge treats the messaging client as a black box: it can be
//! initialized, asked to send and fetch, logged out, and it reports what
//! happens through a stream of [`RawEvent`]s.

mod memory;
pub mod qr;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::{Chat, Contact, RawEvent, RawMessage};

pub use memory::{MemoryClient, MemoryClientFactory};

/// Sending half handed to a client for its raw signals.
pub type RawEventSender = mpsc::UnboundedSender<RawEvent>;

/// Errors reported by an underlying protocol client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("client is not ready")]
    NotReady,
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("contact not found: {0}")]
    ContactNotFound(String),
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Operations offered by one underlying client instance.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Start connecting. Pairing progress arrives as raw events.
    async fn initialize(&self) -> Result<(), ClientError>;

    /// Send a text message and return its id.
    async fn send_message(&self, chat_id: &str, body: &str) -> Result<String, ClientError>;

    async fn get_chats(&self) -> Result<Vec<Chat>, ClientError>;

    async fn get_chat_by_id(&self, chat_id: &str) -> Result<Chat, ClientError>;

    async fn get_contact_by_id(&self, contact_id: &str) -> Result<Contact, ClientError>;

    /// Most recent `limit` messages of a chat, oldest first. With `before`,
    /// only messages strictly older than that unix timestamp are considered.
    async fn fetch_messages(
        &self,
        chat_id: &str,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<RawMessage>, ClientError>;

    /// Mark every message in a chat as seen.
    async fn send_seen(&self, chat_id: &str) -> Result<(), ClientError>;

    /// End the account session on the protocol side.
    async fn logout(&self) -> Result<(), ClientError>;
}

/// Builds one client per session.
pub trait ClientFactory: Send + Sync {
    /// Create a client for `session_id` that reports its signals on `events`.
    fn create(&self, session_id: &str, events: RawEventSender) -> Arc<dyn ProtocolClient>;
}
