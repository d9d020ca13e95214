//! Ordered per-recipient mailboxes carrying signaling messages.
//!
//! Any store offering append, a recipient-filtered live subscription, and
//! delete-by-key can carry the mesh's signaling. Two implementations ship
//! here: an in-process [`MemoryMailbox`] and a [`RelayMailbox`] client for
//! the `jamroom-relay` WebSocket server.

mod memory;
mod relay;
pub mod wire;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::protocol::SignalingMessage;

pub use memory::MemoryMailbox;
pub use relay::RelayMailbox;

/// A stored message plus the key used to acknowledge it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub key: String,
    pub message: SignalingMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("mailbox closed")]
    Closed,

    #[error("mailbox connection error: {0}")]
    Connection(String),

    #[error("mailbox protocol error: {0}")]
    Protocol(String),

    #[error("timed out waiting for the relay")]
    Timeout,

    #[error("relay refused the request: {0}")]
    Rejected(String),

    #[error("inbox {0} is not served by this mailbox")]
    WrongInbox(String),
}

/// Append / subscribe / delete over inboxes keyed by `(room_id, recipient_id)`.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Append to the inbox `(message.room_id, message.to)`.
    async fn append(&self, message: SignalingMessage) -> Result<(), MailboxError>;

    /// Live subscription to one inbox: the current backlog first, then every
    /// new entry in append order.
    async fn subscribe(
        &self,
        room_id: &str,
        recipient_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<MailboxEntry>, MailboxError>;

    /// Remove one entry (acknowledge delivery).
    async fn delete(&self, room_id: &str, recipient_id: &str, key: &str)
        -> Result<(), MailboxError>;
}
