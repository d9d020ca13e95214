//! One remote participant's session: transport, handshake state, and the
//! queue that holds ICE candidates until the remote description is set.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::time::Instant;

use crate::protocol::IceCandidate;
use crate::transport::PeerTransport;

/// Handshake progress for one peer.
///
/// `New → (OfferSent | OfferReceived) → DescriptionsSet → Connected →
/// (Failed | Closed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    OfferSent,
    OfferReceived,
    DescriptionsSet,
    Connected,
    /// Transport reported failed/disconnected. Never retried by the mesh.
    Failed,
    Closed,
}

impl PeerState {
    /// Still negotiating: no connection has been reported yet.
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            Self::New | Self::OfferSent | Self::OfferReceived | Self::DescriptionsSet
        )
    }
}

pub struct PeerSession {
    peer_id: String,
    generation: u64,
    transport: Arc<dyn PeerTransport>,
    state: PeerState,
    connected: bool,
    remote_description_set: bool,
    /// Non-empty only while `remote_description_set` is false.
    queued_candidates: VecDeque<IceCandidate>,
    sends_audio: bool,
    created_at: Instant,
}

impl PeerSession {
    pub fn new(peer_id: &str, generation: u64, transport: Arc<dyn PeerTransport>) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            generation,
            transport,
            state: PeerState::New,
            connected: false,
            remote_description_set: false,
            queued_candidates: VecDeque::new(),
            sends_audio: false,
            created_at: Instant::now(),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn transport(&self) -> Arc<dyn PeerTransport> {
        Arc::clone(&self.transport)
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn remote_description_set(&self) -> bool {
        self.remote_description_set
    }

    pub fn queued_len(&self) -> usize {
        self.queued_candidates.len()
    }

    /// Whether the local capture is attached to this transport.
    pub fn sends_audio(&self) -> bool {
        self.sends_audio
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn set_state(&mut self, state: PeerState) {
        self.state = state;
    }

    pub(crate) fn set_sends_audio(&mut self, sends_audio: bool) {
        self.sends_audio = sends_audio;
    }

    /// Queue a remote candidate, or hand it back if it can be applied now.
    pub fn accept_candidate(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.remote_description_set {
            Some(candidate)
        } else {
            self.queued_candidates.push_back(candidate);
            None
        }
    }

    /// Append candidates that arrived before this session existed.
    pub(crate) fn adopt_candidates(&mut self, early: impl IntoIterator<Item = IceCandidate>) {
        self.queued_candidates.extend(early);
    }

    /// Take every queued candidate, oldest first, without flipping the flag.
    pub(crate) fn take_queued(&mut self) -> Vec<IceCandidate> {
        self.queued_candidates.drain(..).collect()
    }

    /// Flip `remote_description_set` and drain the queue in arrival order.
    ///
    /// The queue is drained exactly once: later calls return nothing.
    pub fn mark_remote_description_set(&mut self) -> Vec<IceCandidate> {
        if self.remote_description_set {
            return Vec::new();
        }
        self.remote_description_set = true;
        self.queued_candidates.drain(..).collect()
    }

    /// Returns `true` if this report changed the connected flag.
    ///
    /// A session waiting on a renegotiation answer stays in `OfferSent`.
    pub(crate) fn mark_connected(&mut self) -> bool {
        let changed = !self.connected;
        self.connected = true;
        if self.state != PeerState::OfferSent {
            self.state = PeerState::Connected;
        }
        changed
    }

    /// Returns `true` if the session newly entered `Failed`.
    pub(crate) fn mark_failed(&mut self) -> bool {
        let changed = self.state != PeerState::Failed;
        self.connected = false;
        self.state = PeerState::Failed;
        changed
    }

    /// Close the transport and mark the session closed.
    pub async fn close(&mut self) {
        self.transport.close().await;
        self.connected = false;
        self.queued_candidates.clear();
        self.state = PeerState::Closed;
    }
}

impl std::fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSession")
            .field("peer_id", &self.peer_id)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("connected", &self.connected)
            .field("remote_description_set", &self.remote_description_set)
            .field("queued_candidates", &self.queued_candidates.len())
            .field("sends_audio", &self.sends_audio)
            .finish()
    }
}
