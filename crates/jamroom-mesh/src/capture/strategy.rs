//! Acquire and hold the single local capture stream.

use std::sync::Arc;

use jamroom_config::CaptureConfig;
use tracing::{info, warn};

use super::types::{AudioConstraints, CaptureError, CaptureSource, MediaDevices};
use crate::media::SharedStream;

pub struct CaptureStrategy {
    devices: Arc<dyn MediaDevices>,
    constraints: AudioConstraints,
    prefer_display: bool,
    active: Option<(SharedStream, CaptureSource)>,
}

impl CaptureStrategy {
    pub fn new(devices: Arc<dyn MediaDevices>, config: &CaptureConfig) -> Self {
        Self {
            devices,
            constraints: AudioConstraints::from(config),
            prefer_display: config.prefer_display_audio,
            active: None,
        }
    }

    /// Acquire the local stream, or return the one already held.
    ///
    /// Display audio is tried first (unless disabled); a refusal or a stream
    /// without audio tracks falls through to the microphone with the same
    /// constraints.
    pub async fn capture(&mut self) -> Result<SharedStream, CaptureError> {
        if let Some((stream, _)) = &self.active {
            return Ok(Arc::clone(stream));
        }

        let display_failure = if self.prefer_display {
            match self.try_display().await {
                Ok(stream) => return Ok(self.hold(stream, CaptureSource::Display)),
                Err(e) => {
                    warn!(error = %e, "Display audio unavailable, falling back to microphone");
                    e.to_string()
                }
            }
        } else {
            "disabled".to_string()
        };

        match self.devices.get_user_media(&self.constraints).await {
            Ok(stream) if stream.audio_track_count() > 0 => {
                Ok(self.hold(stream, CaptureSource::Microphone))
            }
            Ok(stream) => {
                stream.stop();
                Err(CaptureError::Unavailable {
                    display: display_failure,
                    microphone: CaptureError::NoAudioTracks.to_string(),
                })
            }
            Err(e) => Err(CaptureError::Unavailable {
                display: display_failure,
                microphone: e.to_string(),
            }),
        }
    }

    async fn try_display(&self) -> Result<SharedStream, CaptureError> {
        let stream = self.devices.get_display_media(&self.constraints).await?;
        if stream.audio_track_count() == 0 {
            // e.g. the user shared a tab without ticking "share audio"
            stream.stop();
            return Err(CaptureError::NoAudioTracks);
        }
        Ok(stream)
    }

    fn hold(&mut self, stream: SharedStream, source: CaptureSource) -> SharedStream {
        info!(
            stream_id = stream.id(),
            tracks = stream.audio_track_count(),
            source = %source,
            "Local audio captured"
        );
        self.active = Some((Arc::clone(&stream), source));
        stream
    }

    /// Stop and drop the held stream. Returns `false` if nothing was held.
    pub fn release(&mut self) -> bool {
        match self.active.take() {
            Some((stream, source)) => {
                stream.stop();
                info!(stream_id = stream.id(), source = %source, "Local audio released");
                true
            }
            None => false,
        }
    }

    pub fn stream(&self) -> Option<SharedStream> {
        self.active.as_ref().map(|(stream, _)| Arc::clone(stream))
    }

    pub fn source(&self) -> Option<CaptureSource> {
        self.active.as_ref().map(|(_, source)| *source)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}
