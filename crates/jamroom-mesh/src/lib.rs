//! Peer-to-peer audio mesh for music rooms.
//!
//! Every participant who shares audio holds one direct peer connection per
//! remote participant. Connections are bootstrapped through a [`Mailbox`]
//! relay: offers, answers and ICE candidates are dropped into the
//! recipient's inbox and acknowledged on delivery. The media engine itself
//! (peer transport, capture devices, audio output) sits behind traits so
//! this crate only owns the coordination layer.

pub mod capture;
pub mod error;
pub mod mailbox;
pub mod manager;
pub mod media;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod signaling;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use capture::{AudioConstraints, CaptureError, CaptureSource, CaptureStrategy, MediaDevices};
pub use error::MeshError;
pub use mailbox::{Mailbox, MailboxEntry, MailboxError, MemoryMailbox, RelayMailbox};
pub use manager::{MeshBackends, MeshEvent, PeerSessionManager};
pub use media::{MediaStream, SharedStream};
pub use playback::{AudioOutput, PlaybackError, PlaybackSink, PlaybackStatus, RemotePlaybackManager};
pub use protocol::{
    IceCandidate, InboundSignal, SdpType, SessionDescription, Signal, SignalType,
    SignalingMessage,
};
pub use session::{PeerSession, PeerState};
pub use signaling::{SignalingChannel, SignalingError};
pub use transport::{
    ConnectionState, IceConnectionState, PeerTransport, PeerTransportEvent, TransportError,
    TransportEvent, TransportEvents, TransportFactory, TransportOptions,
};
