//! Exactly-once delivery of typed signals over a mailbox.

mod channel;
mod dedup;


pub use channel::SignalingChannel;

use crate::mailbox::MailboxError;

#[derive(Debug, thiserror::Error)]
pub enum SignalingError {
    #[error("failed to encode signal payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to send signal: {0}")]
    Send(#[source] MailboxError),

    #[error("failed to subscribe to inbox: {0}")]
    Subscribe(#[source] MailboxError),
}
