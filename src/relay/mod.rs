//! Event relay to the business application.
//!
//! Relaying is fire-and-forget from the session's point of view: failures
//! are logged and dropped, never retried, and never undo the state change
//! that produced the event.

mod envelope;
mod memory;
mod webhook;

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::RelayError;
use crate::types::NormalizedEvent;

pub use envelope::{AckPayload, MessagePayload, WebhookEnvelope};
pub use memory::MemorySink;
pub use webhook::WebhookRelay;

/// Destination for normalized events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn relay(&self, event: &NormalizedEvent) -> Result<(), RelayError>;
}

/// Relay `event`, logging a failure instead of returning it.
pub async fn relay_logged(sink: &dyn EventSink, event: &NormalizedEvent) -> bool {
    match sink.relay(event).await {
        Ok(()) => {
            debug!(
                "relayed {} for session {}",
                event.kind(),
                event.session_id()
            );
            true
        }
        Err(e) => {
            warn!(
                "dropping {} for session {}: {}",
                event.kind(),
                event.session_id(),
                e
            );
            false
        }
    }
}
