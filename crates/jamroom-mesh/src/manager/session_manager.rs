//! Public surface of the session manager and its event loop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use jamroom_config::{MeshConfig, SessionConfig};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::types::{MeshBackends, MeshEvent, MeshState};
use crate::capture::{CaptureError, CaptureStrategy, MediaDevices};
use crate::error::MeshError;
use crate::mailbox::RelayMailbox;
use crate::playback::{AudioOutput, RemotePlaybackManager};
use crate::protocol::{InboundSignal, Signal};
use crate::session::{PeerSession, PeerState};
use crate::signaling::SignalingChannel;
use crate::transport::{
    PeerTransportEvent, TransportError, TransportEvents, TransportFactory, TransportOptions,
};

// ---------------------------------------------------------------------------
// Peer Session Manager
// ---------------------------------------------------------------------------

/// Mesh of direct audio connections for one participant in one room.
///
/// Construct on room entry and call [`dispose`](Self::dispose) on leave.
pub struct PeerSessionManager {
    pub(super) room_id: String,
    pub(super) user_id: String,
    pub(super) config: SessionConfig,
    transport_options: TransportOptions,
    pub(super) signaling: SignalingChannel,
    transports: Arc<dyn TransportFactory>,
    /// Sessions, roster, capture and playback under one lock.
    pub(super) state: Mutex<MeshState>,
    next_generation: AtomicU64,
    transport_tx: mpsc::UnboundedSender<PeerTransportEvent>,
    /// Taken by `run` while it is pumping.
    transport_rx: Mutex<Option<mpsc::UnboundedReceiver<PeerTransportEvent>>>,
    event_tx: mpsc::Sender<MeshEvent>,
    shutdown: Notify,
    running: AtomicBool,
}

impl PeerSessionManager {
    pub fn new(
        config: &MeshConfig,
        room_id: &str,
        user_id: &str,
        backends: MeshBackends,
    ) -> (Self, mpsc::Receiver<MeshEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.session.event_buffer.max(1));
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        let signaling = SignalingChannel::new(
            backends.mailbox,
            room_id,
            user_id,
            config.signaling.dedup_capacity,
            config.signaling.subscription_buffer,
        );

        let mgr = Self {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
            config: config.session.clone(),
            transport_options: TransportOptions {
                ice_servers: config.session.ice_servers.clone(),
            },
            signaling,
            transports: backends.transports,
            state: Mutex::new(MeshState {
                capture: CaptureStrategy::new(backends.devices, &config.capture),
                playback: RemotePlaybackManager::new(backends.audio_output),
                sessions: HashMap::new(),
                pending_candidates: HashMap::new(),
                deferred_offers: HashMap::new(),
                roster: Vec::new(),
            }),
            next_generation: AtomicU64::new(0),
            transport_tx,
            transport_rx: Mutex::new(Some(transport_rx)),
            event_tx,
            shutdown: Notify::new(),
            running: AtomicBool::new(false),
        };

        info!(room_id, user_id, "Peer session manager created");
        (mgr, event_rx)
    }

    /// Connect to the relay named in `config.relay` and build a manager on it.
    pub async fn over_relay(
        config: &MeshConfig,
        room_id: &str,
        user_id: &str,
        devices: Arc<dyn MediaDevices>,
        transports: Arc<dyn TransportFactory>,
        audio_output: Arc<dyn AudioOutput>,
    ) -> Result<(Self, mpsc::Receiver<MeshEvent>), MeshError> {
        let mailbox = RelayMailbox::connect(
            &config.relay.url,
            room_id,
            user_id,
            Duration::from_secs(config.relay.hello_timeout_secs),
        )
        .await?;

        Ok(Self::new(
            config,
            room_id,
            user_id,
            MeshBackends {
                mailbox: Arc::new(mailbox),
                devices,
                transports,
                audio_output,
            },
        ))
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    // -- Sharing ------------------------------------------------------------

    /// Capture local audio and connect to everyone in the roster.
    ///
    /// Idempotent while sharing. On failure nothing is left behind.
    pub async fn start_sharing(&self) -> Result<(), CaptureError> {
        let mut state = self.state.lock().await;
        if state.capture.is_active() {
            debug!("Already sharing");
            return Ok(());
        }

        let stream = match state.capture.capture().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Could not capture local audio");
                self.emit(MeshEvent::CaptureFailed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };
        if let Some(source) = state.capture.source() {
            self.emit(MeshEvent::SharingStarted { source });
        }
        info!(room_id = %self.room_id, stream_id = stream.id(), "Sharing started");

        // Receive-only sessions start sending through a fresh offer.
        let receive_only: Vec<String> = state
            .sessions
            .values()
            .filter(|s| !s.sends_audio())
            .map(|s| s.peer_id().to_string())
            .collect();
        for peer_id in receive_only {
            self.renegotiate(&mut state, &peer_id, &stream).await;
        }

        self.answer_deferred(&mut state).await;

        let roster = state.roster.clone();
        for peer_id in roster {
            self.connect_locked(&mut state, &peer_id).await;
        }
        Ok(())
    }

    /// Close every session, clear playback and release the local stream.
    pub async fn stop_sharing(&self) {
        let mut state = self.state.lock().await;
        let was_sharing = self.teardown_all(&mut state).await;
        if was_sharing {
            self.emit(MeshEvent::SharingStopped);
            info!(room_id = %self.room_id, "Sharing stopped");
        }
    }

    pub async fn is_currently_sharing(&self) -> bool {
        self.state.lock().await.capture.is_active()
    }

    /// Level of the local stream in `[0.0, 1.0]`.
    ///
    /// Falls back to `1.0` when a local audio track exists but no analyser
    /// level is available.
    pub async fn active_audio_level(&self) -> f32 {
        let state = self.state.lock().await;
        match state.capture.stream() {
            Some(stream) => match stream.audio_level() {
                Some(level) => level.clamp(0.0, 1.0),
                None if stream.audio_track_count() > 0 => 1.0,
                None => 0.0,
            },
            None => 0.0,
        }
    }

    // -- Roster -------------------------------------------------------------

    /// Open an outbound session to `peer_id`.
    ///
    /// No-op (returns `false`) for ourselves, for a peer that already has a
    /// session, or while not sharing.
    pub async fn connect_to_peer(&self, peer_id: &str) -> bool {
        let mut state = self.state.lock().await;
        self.connect_locked(&mut state, peer_id).await
    }

    /// Reconcile sessions against the room's current participants.
    pub async fn update_participants(&self, participants: &[String]) {
        let mut state = self.state.lock().await;

        let mut roster: Vec<String> = Vec::with_capacity(participants.len());
        for id in participants {
            if *id != self.user_id && !roster.contains(id) {
                roster.push(id.clone());
            }
        }

        let departed: Vec<String> = state
            .sessions
            .keys()
            .filter(|id| !roster.contains(id))
            .cloned()
            .collect();
        for peer_id in &departed {
            info!(peer = %peer_id, "Participant left, closing session");
            self.remove_session(&mut state, peer_id).await;
        }
        state.pending_candidates.retain(|id, _| roster.contains(id));
        state.deferred_offers.retain(|id, _| roster.contains(id));

        state.roster = roster.clone();
        debug!(participants = roster.len(), removed = departed.len(), "Roster updated");

        for peer_id in roster {
            self.connect_locked(&mut state, &peer_id).await;
        }
    }

    // -- Playback -----------------------------------------------------------

    /// Forward a user interaction to the one-shot autoplay retry.
    pub async fn on_user_gesture(&self) {
        let mut state = self.state.lock().await;
        for peer_id in state.playback.on_user_gesture().await {
            self.emit(MeshEvent::PlaybackStarted { peer_id });
        }
    }

    /// Retry every blocked remote stream now.
    pub async fn resume_audio(&self) {
        let mut state = self.state.lock().await;
        for peer_id in state.playback.resume_audio().await {
            self.emit(MeshEvent::PlaybackStarted { peer_id });
        }
    }

    // -- Diagnostics --------------------------------------------------------

    pub async fn connected_peers_count(&self) -> usize {
        let state = self.state.lock().await;
        state.sessions.values().filter(|s| s.is_connected()).count()
    }

    pub async fn peer_state(&self, peer_id: &str) -> Option<PeerState> {
        self.state.lock().await.sessions.get(peer_id).map(|s| s.state())
    }

    /// Ids with a session, sorted.
    pub async fn peer_ids(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    // -- Timeouts -----------------------------------------------------------

    /// Close sessions that have not connected within the handshake timeout.
    ///
    /// Returns how many were closed. Always `0` when the timeout is disabled.
    pub async fn expire_stalled_handshakes(&self) -> usize {
        let Some(timeout) = self.handshake_timeout() else {
            return 0;
        };

        let mut state = self.state.lock().await;
        let now = Instant::now();
        let stalled: Vec<String> = state
            .sessions
            .values()
            .filter(|s| {
                !s.is_connected()
                    && s.state().is_handshaking()
                    && now.duration_since(s.created_at()) >= timeout
            })
            .map(|s| s.peer_id().to_string())
            .collect();

        for peer_id in &stalled {
            warn!(peer = %peer_id, timeout_secs = timeout.as_secs(), "Handshake timed out");
            self.remove_session(&mut state, peer_id).await;
        }
        stalled.len()
    }

    fn handshake_timeout(&self) -> Option<Duration> {
        match self.config.handshake_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    // -- Event loop ---------------------------------------------------------

    /// Pump inbound signals, transport events and handshake expiry until
    /// [`dispose`](Self::dispose) is called.
    pub async fn run(self: Arc<Self>) -> Result<(), MeshError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MeshError::AlreadyRunning);
        }
        let Some(mut transport_rx) = self.transport_rx.lock().await.take() else {
            self.running.store(false, Ordering::SeqCst);
            return Err(MeshError::AlreadyRunning);
        };

        let mut signals = match self.signaling.subscribe().await {
            Ok(rx) => rx,
            Err(e) => {
                *self.transport_rx.lock().await = Some(transport_rx);
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let expiry = self.handshake_timeout();
        let period = expiry
            .map(|t| t.min(Duration::from_secs(1)))
            .unwrap_or(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);

        info!(room_id = %self.room_id, user_id = %self.user_id, "Mesh event loop started");
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => {
                        warn!("Signaling subscription ended");
                        break;
                    }
                },
                event = transport_rx.recv() => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => break,
                },
                _ = ticker.tick(), if expiry.is_some() => {
                    self.expire_stalled_handshakes().await;
                }
            }
        }

        *self.transport_rx.lock().await = Some(transport_rx);
        self.running.store(false, Ordering::SeqCst);
        info!(room_id = %self.room_id, "Mesh event loop stopped");
        Ok(())
    }

    /// Stop the event loop, close every session including receive-only
    /// ones, and drop the signaling subscription.
    pub async fn dispose(&self) {
        self.shutdown.notify_one();
        {
            let mut state = self.state.lock().await;
            if self.teardown_all(&mut state).await {
                self.emit(MeshEvent::SharingStopped);
            }
            state.roster.clear();
        }
        self.signaling.cleanup().await;
        info!(room_id = %self.room_id, user_id = %self.user_id, "Peer session manager disposed");
    }

    // -- Signals ------------------------------------------------------------

    /// Apply one inbound signaling message.
    pub async fn handle_signal(&self, inbound: InboundSignal) {
        if inbound.from == self.user_id {
            debug!("Ignoring signal from ourselves");
            return;
        }

        let mut state = self.state.lock().await;
        match inbound.signal {
            Signal::Offer(desc) => self.on_offer(&mut state, &inbound.from, desc).await,
            Signal::Answer(desc) => self.on_answer(&mut state, &inbound.from, desc).await,
            Signal::IceCandidate(candidate) => {
                self.on_remote_candidate(&mut state, &inbound.from, candidate)
                    .await
            }
        }
    }

    // -- Internals ----------------------------------------------------------

    /// Create a transport for `peer_id` tagged with a fresh generation.
    pub(super) async fn new_session(&self, peer_id: &str) -> Result<PeerSession, TransportError> {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let events = TransportEvents::new(peer_id, generation, self.transport_tx.clone());
        let transport = self.transports.create(&self.transport_options, events).await?;
        Ok(PeerSession::new(peer_id, generation, transport))
    }

    /// Close one session and everything hanging off it.
    pub(super) async fn remove_session(&self, state: &mut MeshState, peer_id: &str) -> bool {
        state.pending_candidates.remove(peer_id);
        state.deferred_offers.remove(peer_id);
        state.playback.detach(peer_id);
        match state.sessions.remove(peer_id) {
            Some(mut session) => {
                session.close().await;
                self.emit(MeshEvent::PeerRemoved {
                    peer_id: peer_id.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Close all sessions, clear playback, release capture.
    /// Returns whether a local stream was held.
    async fn teardown_all(&self, state: &mut MeshState) -> bool {
        let peers: Vec<String> = state.sessions.keys().cloned().collect();
        for peer_id in &peers {
            self.remove_session(state, peer_id).await;
        }
        state.pending_candidates.clear();
        state.deferred_offers.clear();
        state.playback.clear();
        state.capture.release()
    }

    /// Queue a UI event without blocking the handshake.
    pub(super) fn emit(&self, event: MeshEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!(error = %e, "Mesh event dropped");
        }
    }
}
