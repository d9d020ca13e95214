use serde::{Deserialize, Serialize};

/// Mailbox relay settings, shared by the client and the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// WebSocket URL clients connect to.
    pub url: String,
    /// Port the relay server listens on.
    pub port: u16,
    /// Undelivered messages older than this are dropped by the server.
    pub inbox_ttl_secs: u64,
    /// How long either side waits for the hello exchange. Clients also
    /// wait this long for the reply to each request.
    pub hello_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".into(),
            port: 8080,
            inbox_ttl_secs: 300,
            hello_timeout_secs: 10,
        }
    }
}
