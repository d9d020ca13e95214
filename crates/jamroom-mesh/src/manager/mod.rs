//! Peer session manager: turns a room roster into live audio connections.
//!
//! Owns the local capture stream, one [`PeerSession`](crate::PeerSession)
//! per remote participant, and the handshake state machine. Inbound signals
//! and transport events may arrive in any order; every handshake step runs
//! under one coordinating lock.

mod events;
mod handshake;
mod session_manager;
mod types;


pub use session_manager::PeerSessionManager;
pub use types::{MeshBackends, MeshEvent};
