//! Per-peer sinks, blocked-autoplay tracking and gesture retry.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::types::{AudioOutput, PlaybackError, PlaybackSink, PlaybackStatus};
use crate::media::SharedStream;

struct Attached {
    sink: Box<dyn PlaybackSink>,
    status: PlaybackStatus,
}

/// At most one sink per remote peer.
pub struct RemotePlaybackManager {
    output: Arc<dyn AudioOutput>,
    sinks: HashMap<String, Attached>,
    /// One-shot: the next user gesture retries blocked sinks, then disarms.
    gesture_armed: bool,
}

impl RemotePlaybackManager {
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            sinks: HashMap::new(),
            gesture_armed: false,
        }
    }

    /// Bind `stream` to a fresh sink for `peer_id` and try to play it.
    ///
    /// Any previous sink for the peer is torn down first.
    pub async fn attach(&mut self, peer_id: &str, stream: SharedStream) -> PlaybackStatus {
        if self.detach(peer_id) {
            debug!(peer = peer_id, "Replaced existing playback sink");
        }

        let stream_id = stream.id().to_string();
        let sink = self.output.create_sink(peer_id, stream);
        let status = play(peer_id, sink.as_ref()).await;
        if status == PlaybackStatus::Blocked {
            self.gesture_armed = true;
        }
        info!(peer = peer_id, stream_id = %stream_id, ?status, "Remote audio attached");

        self.sinks
            .insert(peer_id.to_string(), Attached { sink, status });
        status
    }

    /// Pause, unbind and drop the peer's sink. Returns `false` if none existed.
    pub fn detach(&mut self, peer_id: &str) -> bool {
        match self.sinks.remove(peer_id) {
            Some(attached) => {
                attached.sink.pause();
                attached.sink.detach();
                if self.pending_count() == 0 {
                    self.gesture_armed = false;
                }
                true
            }
            None => false,
        }
    }

    /// Retry blocked sinks if a retry is armed.
    ///
    /// Returns the peers whose playback started.
    pub async fn on_user_gesture(&mut self) -> Vec<String> {
        if !self.gesture_armed {
            return Vec::new();
        }
        self.gesture_armed = false;
        self.retry_blocked().await
    }

    /// Retry every blocked sink regardless of gesture arming.
    pub async fn resume_audio(&mut self) -> Vec<String> {
        self.retry_blocked().await
    }

    async fn retry_blocked(&mut self) -> Vec<String> {
        let mut started = Vec::new();
        for (peer_id, attached) in self.sinks.iter_mut() {
            if attached.status != PlaybackStatus::Blocked {
                continue;
            }
            attached.status = play(peer_id, attached.sink.as_ref()).await;
            if attached.status == PlaybackStatus::Playing {
                started.push(peer_id.clone());
            }
        }

        // Still blocked: wait for the next gesture.
        if self.pending_count() > 0 {
            self.gesture_armed = true;
        }
        started.sort();
        started
    }

    /// Tear down every sink.
    pub fn clear(&mut self) {
        for (_, attached) in self.sinks.drain() {
            attached.sink.pause();
            attached.sink.detach();
        }
        self.gesture_armed = false;
    }

    pub fn status(&self, peer_id: &str) -> Option<PlaybackStatus> {
        self.sinks.get(peer_id).map(|a| a.status)
    }

    /// Number of sinks waiting on autoplay permission.
    pub fn pending_count(&self) -> usize {
        self.sinks
            .values()
            .filter(|a| a.status == PlaybackStatus::Blocked)
            .count()
    }

    /// Peers with an attached sink, sorted.
    pub fn active_sinks(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.sinks.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn is_gesture_armed(&self) -> bool {
        self.gesture_armed
    }
}

async fn play(peer_id: &str, sink: &dyn PlaybackSink) -> PlaybackStatus {
    match sink.play().await {
        Ok(()) => PlaybackStatus::Playing,
        Err(PlaybackError::AutoplayBlocked) => {
            info!(peer = peer_id, "Autoplay blocked, waiting for user interaction");
            PlaybackStatus::Blocked
        }
        Err(e) => {
            warn!(peer = peer_id, error = %e, "Remote audio playback failed");
            PlaybackStatus::Failed
        }
    }
}
