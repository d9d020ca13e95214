//! Capture constraints, sources, errors and the device trait.

use std::fmt;

use async_trait::async_trait;
use jamroom_config::CaptureConfig;

use crate::media::SharedStream;

/// Constraints passed to both capture attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub channel_count: u32,
    /// Always `false`: only audio is ever requested.
    pub video: bool,
}

impl From<&CaptureConfig> for AudioConstraints {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            noise_suppression: config.noise_suppression,
            auto_gain_control: config.auto_gain_control,
            sample_rate: config.sample_rate,
            channel_count: config.channel_count,
            video: false,
        }
    }
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

/// Where the current local stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Display,
    Microphone,
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display => write!(f, "display"),
            Self::Microphone => write!(f, "microphone"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("capture permission denied: {0}")]
    Denied(String),

    #[error("capture device error: {0}")]
    Device(String),

    #[error("captured stream has no audio tracks")]
    NoAudioTracks,

    #[error("no audio source available (display: {display}; microphone: {microphone})")]
    Unavailable { display: String, microphone: String },
}

/// Host media devices.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Capture system/display audio. Implementations must not request video.
    async fn get_display_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<SharedStream, CaptureError>;

    /// Capture the microphone.
    async fn get_user_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<SharedStream, CaptureError>;
}
