//! Peer transport abstraction.
//!
//! A [`PeerTransport`] is one direct connection to one remote participant
//! (a WebRTC peer connection in practice). Its asynchronous callbacks are
//! reported through [`TransportEvents`] rather than closures, so transports
//! can emit from any task without touching the manager's state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::media::SharedStream;
use crate::protocol::{IceCandidate, SessionDescription};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Whether a state report means the link is usable, lost, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Up,
    Down,
    Unchanged,
}

impl ConnectionState {
    pub(crate) fn link(&self) -> Link {
        match self {
            Self::Connected => Link::Up,
            Self::Disconnected | Self::Failed => Link::Down,
            _ => Link::Unchanged,
        }
    }
}

impl IceConnectionState {
    pub(crate) fn link(&self) -> Link {
        match self {
            Self::Connected | Self::Completed => Link::Up,
            Self::Disconnected | Self::Failed => Link::Down,
            _ => Link::Unchanged,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A local ICE candidate was gathered and must reach the remote peer.
    LocalCandidate(IceCandidate),
    ConnectionStateChanged(ConnectionState),
    IceStateChanged(IceConnectionState),
    /// The remote peer's audio arrived.
    RemoteTrack(SharedStream),
}

/// A transport event tagged with the session it belongs to.
///
/// `generation` distinguishes a replaced transport for the same peer from
/// the current one; stale events are ignored.
#[derive(Debug, Clone)]
pub struct PeerTransportEvent {
    pub peer_id: String,
    pub generation: u64,
    pub event: TransportEvent,
}

/// Emitter handed to a transport at creation time.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    peer_id: String,
    generation: u64,
    tx: mpsc::UnboundedSender<PeerTransportEvent>,
}

impl TransportEvents {
    pub fn new(
        peer_id: &str,
        generation: u64,
        tx: mpsc::UnboundedSender<PeerTransportEvent>,
    ) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            generation,
            tx,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event. Returns `false` once the manager has gone away.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(PeerTransportEvent {
                peer_id: self.peer_id.clone(),
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create transport: {0}")]
    Create(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("failed to add ICE candidate: {0}")]
    Candidate(String),
}

/// Settings applied to every transport.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    pub ice_servers: Vec<String>,
}

#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Attach every track of the local stream for sending.
    async fn add_local_stream(&self, stream: SharedStream) -> Result<(), TransportError>;

    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), TransportError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    async fn close(&self);
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        options: &TransportOptions,
        events: TransportEvents,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn either_state_family_reports_link_up() {
        assert_eq!(ConnectionState::Connected.link(), Link::Up);
        assert_eq!(IceConnectionState::Connected.link(), Link::Up);
        assert_eq!(IceConnectionState::Completed.link(), Link::Up);
    }

    #[test]
    fn failed_and_disconnected_report_link_down() {
        assert_eq!(ConnectionState::Failed.link(), Link::Down);
        assert_eq!(ConnectionState::Disconnected.link(), Link::Down);
        assert_eq!(IceConnectionState::Failed.link(), Link::Down);
        assert_eq!(IceConnectionState::Disconnected.link(), Link::Down);
    }

    #[test]
    fn transitional_states_leave_link_unchanged() {
        assert_eq!(ConnectionState::Connecting.link(), Link::Unchanged);
        assert_eq!(ConnectionState::Closed.link(), Link::Unchanged);
        assert_eq!(IceConnectionState::Checking.link(), Link::Unchanged);
    }

    #[tokio::test]
    async fn events_are_tagged_with_peer_and_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = TransportEvents::new("bob", 7, tx);
        assert!(events.emit(TransportEvent::ConnectionStateChanged(
            ConnectionState::Connecting
        )));

        let tagged = rx.recv().await.unwrap();
        assert_eq!(tagged.peer_id, "bob");
        assert_eq!(tagged.generation, 7);

        drop(rx);
        assert!(!events.emit(TransportEvent::IceStateChanged(IceConnectionState::New)));
    }
}
