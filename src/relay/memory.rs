//! In-memory event sink for development and testing.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::relay::EventSink;
use crate::types::NormalizedEvent;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct SinkState {
    events: Vec<NormalizedEvent>,
    attempts: usize,
    failure: Option<RelayError>,
}

/// [`EventSink`] that keeps every relayed event in memory.
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<SinkState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following relay attempt fail with `error`.
    pub fn fail_with(&self, error: RelayError) {
        self.lock().failure = Some(error);
    }

    /// Accept relays again.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// Events accepted so far, in the order they arrived.
    pub fn events(&self) -> Vec<NormalizedEvent> {
        self.lock().events.clone()
    }

    /// Relay attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Wait until an accepted event matches `predicate`.
    pub async fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Option<NormalizedEvent>
    where
        F: Fn(&NormalizedEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let found = self.lock().events.iter().find(|e| predicate(e)).cloned();
            if found.is_some() {
                return found;
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn relay(&self, event: &NormalizedEvent) -> Result<(), RelayError> {
        let mut state = self.lock();
        state.attempts += 1;
        if let Some(error) = state.failure.clone() {
            return Err(error);
        }
        state.events.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disconnected() -> NormalizedEvent {
        NormalizedEvent::Disconnected {
            session_id: "s1".into(),
        }
    }

    #[tokio::test]
    async fn test_records_events() {
        let sink = MemorySink::new();
        sink.relay(&disconnected()).await.unwrap();
        assert_eq!(sink.events(), vec![disconnected()]);
        assert!(sink
            .wait_for(Duration::from_millis(50), |e| e.kind() == "disconnected")
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_failure_counts_attempt_only() {
        let sink = MemorySink::new();
        sink.fail_with(RelayError::AuthFailed("denied".into()));
        assert!(sink.relay(&disconnected()).await.is_err());
        assert_eq!(sink.attempts(), 1);
        assert!(sink.events().is_empty());

        sink.recover();
        sink.relay(&disconnected()).await.unwrap();
        assert_eq!(sink.events().len(), 1);
    }
}
