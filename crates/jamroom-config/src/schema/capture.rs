//! Local audio capture settings.

use serde::{Deserialize, Serialize};

/// Constraints used for both display and microphone capture.
///
/// Processing is off by default: instruments sound wrong through echo
/// cancellation and AGC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Try system/display audio before the microphone.
    pub prefer_display_audio: bool,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
    pub sample_rate: u32,
    pub channel_count: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            prefer_display_audio: true,
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            sample_rate: 48000,
            channel_count: 2,
        }
    }
}
