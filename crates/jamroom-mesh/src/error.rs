use crate::mailbox::MailboxError;
use crate::signaling::SignalingError;

/// Errors surfaced by the mesh's long-running entry points.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error("relay mailbox unavailable: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("mesh event loop is already running")]
    AlreadyRunning,
}
