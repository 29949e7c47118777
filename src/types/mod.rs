//! Types shared between the bridge components.
//!
//! Session states, raw and normalized events, ack mappings, and the chat,
//! contact and message shapes exchanged with the underlying client.

mod chat;
mod events;

pub use chat::*;
pub use events::*;
