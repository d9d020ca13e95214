//! Backends, events and shared state for the session manager.

use std::collections::HashMap;
use std::sync::Arc;

use crate::capture::{CaptureSource, CaptureStrategy, MediaDevices};
use crate::mailbox::Mailbox;
use crate::playback::{AudioOutput, RemotePlaybackManager};
use crate::protocol::{IceCandidate, SessionDescription};
use crate::session::PeerSession;
use crate::transport::TransportFactory;

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Host-provided collaborators.
#[derive(Clone)]
pub struct MeshBackends {
    pub mailbox: Arc<dyn Mailbox>,
    pub devices: Arc<dyn MediaDevices>,
    pub transports: Arc<dyn TransportFactory>,
    pub audio_output: Arc<dyn AudioOutput>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events emitted by the mesh for the room UI.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    SharingStarted {
        source: CaptureSource,
    },
    SharingStopped,
    CaptureFailed {
        reason: String,
    },
    PeerConnecting {
        peer_id: String,
    },
    PeerConnected {
        peer_id: String,
    },
    /// Transport reported failed or disconnected. Not retried.
    PeerDisconnected {
        peer_id: String,
    },
    PeerRemoved {
        peer_id: String,
    },
    PlaybackStarted {
        peer_id: String,
    },
    /// Autoplay refused; call `on_user_gesture` or `resume_audio`.
    PlaybackBlocked {
        peer_id: String,
    },
    Error(String),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the handshake touches, under the manager's single lock.
pub(crate) struct MeshState {
    pub(crate) capture: CaptureStrategy,
    pub(crate) playback: RemotePlaybackManager,
    pub(crate) sessions: HashMap<String, PeerSession>,
    /// Remote candidates that arrived before a session for their sender.
    pub(crate) pending_candidates: HashMap<String, Vec<IceCandidate>>,
    /// Offers held while not sharing with receive-only disabled. Answered
    /// by the next `start_sharing`.
    pub(crate) deferred_offers: HashMap<String, SessionDescription>,
    /// Latest roster, without the local id.
    pub(crate) roster: Vec<String>,
}
