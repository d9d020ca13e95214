//! Peer session and handshake settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Answer offers from peers even before local sharing has started.
    pub allow_receive_only: bool,
    /// Close sessions that have not connected within this many seconds.
    /// `0` disables the timeout.
    pub handshake_timeout_secs: u64,
    /// Capacity of the UI event channel.
    pub event_buffer: usize,
    /// STUN/TURN urls handed to every peer transport.
    pub ice_servers: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            allow_receive_only: true,
            handshake_timeout_secs: 0,
            event_buffer: 256,
            ice_servers: vec!["stun:stun.l.google.com:19302".into()],
        }
    }
}
