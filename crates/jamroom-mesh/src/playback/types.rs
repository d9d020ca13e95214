use async_trait::async_trait;

use crate::media::SharedStream;

#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    /// The host refused to start audio without a user gesture.
    #[error("autoplay blocked until user interaction")]
    AutoplayBlocked,

    #[error("audio output error: {0}")]
    Device(String),
}

/// Outcome of the latest play attempt for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    /// Waiting for a user gesture or an explicit resume.
    Blocked,
    Failed,
}

/// One audio element bound to one remote stream.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn play(&self) -> Result<(), PlaybackError>;

    fn pause(&self);

    /// Unbind the stream from the output.
    fn detach(&self);
}

/// Host audio output that creates sinks.
pub trait AudioOutput: Send + Sync {
    fn create_sink(&self, peer_id: &str, stream: SharedStream) -> Box<dyn PlaybackSink>;
}
