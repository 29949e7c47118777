//! Webhook relay posting envelopes to the business application.
//!
//! Every delivery first obtains a session token from the target's
//! authentication endpoint and then posts the envelope with that token as a
//! cookie. By default a new token is requested for every single delivery;
//! `RelayConfig::reuse_token` keeps it until the target rejects it.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::relay::{EventSink, WebhookEnvelope};
use crate::types::NormalizedEvent;

#[derive(Debug, Deserialize)]
struct AuthReply {
    result: Option<AuthResult>,
}

#[derive(Debug, Deserialize)]
struct AuthResult {
    session_id: Option<String>,
}

struct Inner {
    config: RelayConfig,
    agent: ureq::Agent,
    token: Mutex<Option<String>>,
}

/// [`EventSink`] delivering to the configured webhook target over HTTP.
#[derive(Clone)]
pub struct WebhookRelay {
    inner: Arc<Inner>,
}

impl WebhookRelay {
    pub fn new(config: RelayConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Self {
            inner: Arc::new(Inner {
                config,
                agent: builder.build(),
                token: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.inner.config
    }

    /// Token obtained by the most recent authentication, if any.
    pub fn cached_token(&self) -> Option<String> {
        self.inner.token().clone()
    }
}

impl Inner {
    fn token(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn authenticate(&self) -> Result<String, RelayError> {
        let body = json!({
            "jsonrpc": "2.0",
            "params": {
                "db": self.config.database,
                "login": self.config.username,
                "password": self.config.password,
            }
        });

        let reply: AuthReply = self
            .agent
            .post(&self.config.auth_url())
            .send_json(body)
            .map_err(|e| RelayError::AuthFailed(e.to_string()))?
            .into_json()
            .map_err(|e| RelayError::AuthFailed(e.to_string()))?;

        reply
            .result
            .and_then(|r| r.session_id)
            .ok_or_else(|| RelayError::AuthFailed("no session in authentication reply".into()))
    }

    fn session_token(&self) -> Result<String, RelayError> {
        if self.config.reuse_token {
            if let Some(token) = self.token().clone() {
                return Ok(token);
            }
        }

        let token = self.authenticate()?;
        *self.token() = Some(token.clone());
        Ok(token)
    }

    fn deliver(&self, envelope: &Value) -> Result<(), RelayError> {
        let token = self.session_token()?;

        let result = self
            .agent
            .post(&self.config.hook_url())
            .set("Cookie", &format!("session_id={token}"))
            .send_json(envelope);

        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => {
                if code == 401 || code == 403 {
                    *self.token() = None;
                }
                Err(RelayError::DeliveryFailed(format!(
                    "relay target answered {code}"
                )))
            }
            Err(e) => Err(RelayError::DeliveryFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl EventSink for WebhookRelay {
    async fn relay(&self, event: &NormalizedEvent) -> Result<(), RelayError> {
        let envelope = serde_json::to_value(WebhookEnvelope::from(event))
            .map_err(|e| RelayError::DeliveryFailed(e.to_string()))?;
        debug!(
            "relaying {} for session {}",
            event.kind(),
            event.session_id()
        );

        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.deliver(&envelope))
            .await
            .map_err(|e| RelayError::DeliveryFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AckStatus;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> RelayConfig {
        RelayConfig {
            base_url: server.uri(),
            database: "odoo".into(),
            username: "bridge".into(),
            password: "secret".into(),
            ..Default::default()
        }
    }

    fn ack_event() -> NormalizedEvent {
        NormalizedEvent::AckChanged {
            session_id: "s1".into(),
            message_id: "M1".into(),
            ack_status: AckStatus::Read,
        }
    }

    async fn mount_auth(server: &MockServer, token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/web/session/authenticate"))
            .and(body_partial_json(json!({
                "jsonrpc": "2.0",
                "params": {"db": "odoo", "login": "bridge", "password": "secret"}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "result": {"session_id": token}})),
            )
            .expect(times)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_relay_posts_envelope_with_session_cookie() {
        let server = MockServer::start().await;
        mount_auth(&server, "tok-1", 1).await;
        Mock::given(method("POST"))
            .and(path("/whatsapp/hook"))
            .and(header("Cookie", "session_id=tok-1"))
            .and(body_partial_json(json!({
                "type": "status_update",
                "session_id": "s1",
                "status": {"message_id": "M1", "status": "read"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let relay = WebhookRelay::new(config(&server));
        relay.relay(&ack_event()).await.unwrap();
        assert_eq!(relay.cached_token().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_reauthenticates_before_every_delivery() {
        let server = MockServer::start().await;
        mount_auth(&server, "tok", 2).await;
        Mock::given(method("POST"))
            .and(path("/whatsapp/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let relay = WebhookRelay::new(config(&server));
        relay.relay(&ack_event()).await.unwrap();
        relay.relay(&ack_event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_reuse_token_authenticates_once() {
        let server = MockServer::start().await;
        mount_auth(&server, "tok", 1).await;
        Mock::given(method("POST"))
            .and(path("/whatsapp/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let relay = WebhookRelay::new(RelayConfig {
            reuse_token: true,
            ..config(&server)
        });
        relay.relay(&ack_event()).await.unwrap();
        relay.relay(&ack_event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_token_is_dropped() {
        let server = MockServer::start().await;
        mount_auth(&server, "stale", 1).await;
        Mock::given(method("POST"))
            .and(path("/whatsapp/hook"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let relay = WebhookRelay::new(RelayConfig {
            reuse_token: true,
            ..config(&server)
        });
        let err = relay.relay(&ack_event()).await.unwrap_err();
        assert!(matches!(err, RelayError::DeliveryFailed(_)));
        assert!(relay.cached_token().is_none());
    }

    #[tokio::test]
    async fn test_missing_result_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/web/session/authenticate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "error": {"message": "Access Denied"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/whatsapp/hook"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let relay = WebhookRelay::new(config(&server));
        let err = relay.relay(&ack_event()).await.unwrap_err();
        assert!(matches!(err, RelayError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn test_hook_error_is_delivery_failure() {
        let server = MockServer::start().await;
        mount_auth(&server, "tok", 1).await;
        Mock::given(method("POST"))
            .and(path("/whatsapp/hook"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let relay = WebhookRelay::new(config(&server));
        let err = relay.relay(&ack_event()).await.unwrap_err();
        assert_eq!(
            err,
            RelayError::DeliveryFailed("relay target answered 500".into())
        );
    }

    #[tokio::test]
    async fn test_unreachable_target_is_auth_failure() {
        let relay = WebhookRelay::new(RelayConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        });
        let err = relay.relay(&ack_event()).await.unwrap_err();
        assert!(matches!(err, RelayError::AuthFailed(_)));
    }
}
