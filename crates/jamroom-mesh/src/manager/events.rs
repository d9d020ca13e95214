//! Transport callbacks: local candidates, link state, remote tracks.

use tracing::{debug, info, warn};

use super::session_manager::PeerSessionManager;
use super::types::MeshEvent;
use crate::playback::PlaybackStatus;
use crate::protocol::Signal;
use crate::session::PeerSession;
use crate::transport::{Link, PeerTransportEvent, TransportEvent};

impl PeerSessionManager {
    /// Apply one transport event. Events from replaced or closed transports
    /// are ignored.
    pub async fn handle_transport_event(&self, tagged: PeerTransportEvent) {
        let PeerTransportEvent {
            peer_id,
            generation,
            event,
        } = tagged;

        let mut state = self.state.lock().await;
        let state = &mut *state;
        let Some(session) = state.sessions.get_mut(&peer_id) else {
            debug!(peer = %peer_id, "Transport event for unknown session");
            return;
        };
        if session.generation() != generation {
            debug!(peer = %peer_id, generation, current = session.generation(), "Ignoring stale transport event");
            return;
        }

        match event {
            TransportEvent::LocalCandidate(candidate) => {
                if let Err(e) = self
                    .signaling
                    .send(&Signal::IceCandidate(candidate), &peer_id)
                    .await
                {
                    warn!(peer = %peer_id, error = %e, "Failed to send ICE candidate");
                }
            }
            TransportEvent::ConnectionStateChanged(s) => {
                debug!(peer = %peer_id, state = ?s, "Connection state changed");
                self.apply_link(session, s.link());
            }
            TransportEvent::IceStateChanged(s) => {
                debug!(peer = %peer_id, state = ?s, "ICE state changed");
                self.apply_link(session, s.link());
            }
            TransportEvent::RemoteTrack(stream) => {
                let status = state.playback.attach(&peer_id, stream).await;
                match status {
                    PlaybackStatus::Playing => self.emit(MeshEvent::PlaybackStarted { peer_id }),
                    PlaybackStatus::Blocked => self.emit(MeshEvent::PlaybackBlocked { peer_id }),
                    PlaybackStatus::Failed => {
                        self.emit(MeshEvent::Error(format!("playback failed for {peer_id}")))
                    }
                }
            }
        }
    }

    fn apply_link(&self, session: &mut PeerSession, link: Link) {
        let peer_id = session.peer_id().to_string();
        match link {
            Link::Up => {
                if session.mark_connected() {
                    info!(peer = %peer_id, "Peer connected");
                    self.emit(MeshEvent::PeerConnected { peer_id });
                }
            }
            Link::Down => {
                if session.mark_failed() {
                    warn!(peer = %peer_id, "Peer connection lost");
                    self.emit(MeshEvent::PeerDisconnected { peer_id });
                }
            }
            Link::Unchanged => {}
        }
    }
}
