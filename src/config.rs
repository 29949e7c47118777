use std::{env, fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Default number of messages returned by a message listing.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// Connection details for the business application receiving webhook events.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    /// Base URL of the relay target, without a trailing slash.
    pub base_url: String,
    /// Database name sent with every authentication call.
    pub database: String,
    /// Login used to obtain a session token.
    pub username: String,
    /// Password used to obtain a session token.
    pub password: String,
    /// Keep the session token between deliveries instead of authenticating each time.
    pub reuse_token: bool,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8069".into(),
            database: "odoo".into(),
            username: "admin".into(),
            password: "admin".into(),
            reuse_token: false,
            timeout: None,
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("reuse_token", &self.reuse_token)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RelayConfig {
    /// Endpoint used to exchange credentials for a session token.
    pub fn auth_url(&self) -> String {
        format!("{}/web/session/authenticate", self.base_url.trim_end_matches('/'))
    }

    /// Endpoint receiving webhook envelopes.
    pub fn hook_url(&self) -> String {
        format!("{}/whatsapp/hook", self.base_url.trim_end_matches('/'))
    }
}

/// Base configuration used by the bridge service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Relay target settings.
    pub relay: RelayConfig,
    /// Host the command interface binds to.
    pub host: String,
    /// Port the command interface listens on.
    pub port: u16,
    /// Number of messages returned when a listing does not ask for a limit.
    pub default_message_limit: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            host: "0.0.0.0".into(),
            port: 3000,
            default_message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

impl BridgeConfig {
    /// Build a configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("ODOO_URL") {
            config.relay.base_url = url;
        }
        if let Some(db) = lookup("ODOO_DB") {
            config.relay.database = db;
        }
        if let Some(username) = lookup("ODOO_USERNAME") {
            config.relay.username = username;
        }
        if let Some(password) = lookup("ODOO_PASSWORD") {
            config.relay.password = password;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Some(secs) = lookup("BRIDGE_RELAY_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.relay.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(flag) = lookup("BRIDGE_REUSE_RELAY_TOKEN") {
            config.relay.reuse_token = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Override the relay target base URL.
    pub fn with_relay_url(mut self, url: impl Into<String>) -> Self {
        self.relay.base_url = url.into();
        self
    }

    /// Override the relay credentials.
    pub fn with_credentials(
        mut self,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.relay.database = database.into();
        self.relay.username = username.into();
        self.relay.password = password.into();
        self
    }

    /// Override the bind host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Override the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Address the command interface binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
