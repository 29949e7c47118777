//! whatsapp-bridge: multi-session WhatsApp bridge service
//!
//! Manages many independent WhatsApp sessions, each keyed by a caller-chosen
//! identifier, and forwards their connection, message and delivery events to
//! a business application over an authenticated webhook.
//!
//! ## Modules
//!
//! - `types` - Session states, raw and normalized events, chat records
//! - `protocol` - Underlying client abstraction, QR rendering, in-memory client
//! - `store` - Session records and the session store
//! - `adapter` - Client creation and raw event normalization
//! - `relay` - Webhook envelopes and event delivery
//! - `manager` - Session lifecycle and command operations
//! - `server` - HTTP command interface
//! - `config` - Configuration management

pub mod adapter;
pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod store;
pub mod types;

pub use adapter::{ClientAdapter, ClientHandle};
pub use config::{BridgeConfig, RelayConfig};
pub use error::{BridgeError, BridgeResult, RelayError};
pub use manager::SessionManager;
pub use protocol::{ClientError, ClientFactory, MemoryClient, MemoryClientFactory, ProtocolClient};
pub use relay::{EventSink, MemorySink, WebhookEnvelope, WebhookRelay};
pub use store::{MemoryStore, Session, SessionStatus, SessionStore};
pub use types::{NormalizedEvent, RawEvent, SessionState};
