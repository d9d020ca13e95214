//! Frames exchanged between [`RelayMailbox`](super::RelayMailbox) and the
//! relay server. Every frame is one JSON text message.
//!
//! Requests after the hello carry a client-chosen `id`. The relay answers
//! each one with exactly one `done` or `error` frame echoing that id.

use serde::{Deserialize, Serialize};

use crate::protocol::SignalingMessage;

/// Client → relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame: binds the connection to one inbox.
    Hello { room_id: String, user_id: String },
    /// Start streaming the bound inbox (backlog, then live entries).
    Subscribe { id: u64 },
    Append { id: u64, message: SignalingMessage },
    Delete { id: u64, key: String },
}

impl ClientFrame {
    /// Request id, absent on the hello.
    pub fn id(&self) -> Option<u64> {
        match self {
            ClientFrame::Hello { .. } => None,
            ClientFrame::Subscribe { id }
            | ClientFrame::Append { id, .. }
            | ClientFrame::Delete { id, .. } => Some(*id),
        }
    }
}

/// Relay → client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    Ready { room_id: String, user_id: String },
    Entry { key: String, message: SignalingMessage },
    /// Request `id` was applied.
    Done { id: u64 },
    /// Request `id` was refused, or the frame could not be read at all.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        message: String,
    },
}
