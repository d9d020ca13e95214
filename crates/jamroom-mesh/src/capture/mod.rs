//! Local audio capture with display-audio-first fallback.
//!
//! The mesh shares exactly one local stream per sharing session. It prefers
//! the system/display audio (what the instrument is playing) and falls back
//! to the microphone when that is refused or carries no audio.

mod strategy;
mod types;


pub use strategy::CaptureStrategy;
pub use types::{AudioConstraints, CaptureError, CaptureSource, MediaDevices};
