//! Media stream handle shared by capture, transports and playback.

use std::fmt;
use std::sync::Arc;

/// A live audio stream: the local capture or a remote peer's inbound audio.
pub trait MediaStream: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn audio_track_count(&self) -> usize;

    /// Current input level in `[0.0, 1.0]` if the stream is being analysed.
    fn audio_level(&self) -> Option<f32> {
        None
    }

    /// Stop every track. Idempotent.
    fn stop(&self);
}

pub type SharedStream = Arc<dyn MediaStream>;
