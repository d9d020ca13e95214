//! Per-peer handshake state.

mod peer;


pub use peer::{PeerSession, PeerState};
