//! Playback of remote peers' audio under autoplay restrictions.

mod manager;
mod types;


pub use manager::RemotePlaybackManager;
pub use types::{AudioOutput, PlaybackError, PlaybackSink, PlaybackStatus};
