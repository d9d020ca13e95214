//! Offer/answer exchange and remote candidate ordering.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::session_manager::PeerSessionManager;
use super::types::{MeshEvent, MeshState};
use crate::media::SharedStream;
use crate::protocol::{IceCandidate, SessionDescription, Signal};
use crate::session::{PeerSession, PeerState};
use crate::transport::PeerTransport;

impl PeerSessionManager {
    /// Open an outbound session while holding the state lock.
    pub(super) async fn connect_locked(&self, state: &mut MeshState, peer_id: &str) -> bool {
        if peer_id == self.user_id || state.sessions.contains_key(peer_id) {
            return false;
        }
        let Some(stream) = state.capture.stream() else {
            debug!(peer = peer_id, "Not sharing, skipping connect");
            return false;
        };

        let mut session = match self.new_session(peer_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(peer = peer_id, error = %e, "Failed to create transport");
                self.emit(MeshEvent::Error(format!("transport for {peer_id}: {e}")));
                return false;
            }
        };
        // The peer has not seen this offer, so anything buffered belongs to
        // one of its older transports.
        if let Some(stale) = state.pending_candidates.remove(peer_id) {
            debug!(peer = peer_id, dropped = stale.len(), "Dropping candidates buffered before our offer");
        }
        self.emit(MeshEvent::PeerConnecting {
            peer_id: peer_id.to_string(),
        });

        if attach_stream(&mut session, &stream).await {
            self.send_offer(&mut session).await;
        }
        info!(peer = peer_id, state = ?session.state(), "Outbound session opened");
        state.sessions.insert(peer_id.to_string(), session);
        true
    }

    /// Answer offers that arrived before we were sharing.
    pub(super) async fn answer_deferred(&self, state: &mut MeshState) {
        let deferred: Vec<(String, SessionDescription)> = state.deferred_offers.drain().collect();
        for (peer_id, offer) in deferred {
            if state.sessions.contains_key(&peer_id) {
                continue;
            }
            info!(peer = %peer_id, "Answering offer held while not sharing");
            self.answer_new(state, &peer_id, offer, Vec::new()).await;
        }
    }

    /// Start sending on a session that was receive-only.
    pub(super) async fn renegotiate(
        &self,
        state: &mut MeshState,
        peer_id: &str,
        stream: &SharedStream,
    ) {
        let Some(session) = state.sessions.get_mut(peer_id) else {
            return;
        };
        if !matches!(
            session.state(),
            PeerState::DescriptionsSet | PeerState::Connected
        ) {
            debug!(peer = peer_id, state = ?session.state(), "Session not stable, skipping renegotiation");
            return;
        }

        if attach_stream(session, stream).await {
            info!(peer = peer_id, "Renegotiating to send local audio");
            self.send_offer(session).await;
        }
    }

    /// Create, apply and send an offer. The session stalls on failure.
    async fn send_offer(&self, session: &mut PeerSession) {
        let transport = session.transport();
        let offer = match transport.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                warn!(peer = session.peer_id(), error = %e, "Failed to create offer");
                return;
            }
        };
        if let Err(e) = transport.set_local_description(offer.clone()).await {
            warn!(peer = session.peer_id(), error = %e, "Failed to apply local offer");
            return;
        }
        session.set_state(PeerState::OfferSent);

        if let Err(e) = self
            .signaling
            .send(&Signal::Offer(offer), session.peer_id())
            .await
        {
            warn!(peer = session.peer_id(), error = %e, "Failed to send offer");
        }
    }

    // -- Inbound ------------------------------------------------------------

    pub(super) async fn on_offer(
        &self,
        state: &mut MeshState,
        from: &str,
        offer: SessionDescription,
    ) {
        if !state.sessions.contains_key(from) {
            if !state.capture.is_active() && !self.config.allow_receive_only {
                info!(peer = from, "Not sharing, holding offer until sharing starts");
                state.deferred_offers.insert(from.to_string(), offer);
                return;
            }
            self.answer_new(state, from, offer, Vec::new()).await;
            return;
        }
        let Some(session) = state.sessions.get_mut(from) else {
            return;
        };

        match session.state() {
            PeerState::OfferSent => {
                // Both sides offered. The smaller id yields and answers.
                if self.user_id.as_str() < from {
                    info!(peer = from, "Offer collision, yielding to remote offer");
                    let queued = session.take_queued();
                    if let Some(mut ours) = state.sessions.remove(from) {
                        ours.close().await;
                    }
                    self.answer_new(state, from, offer, queued).await;
                } else {
                    info!(peer = from, "Offer collision, keeping our offer");
                }
            }
            PeerState::DescriptionsSet | PeerState::Connected
                if session.remote_description_set() =>
            {
                let stream = state.capture.stream();
                self.answer_renegotiation(session, offer, stream).await;
            }
            other => {
                debug!(peer = from, state = ?other, "Ignoring offer for existing session");
            }
        }
    }

    /// Answer a first offer from `from` with a fresh session.
    async fn answer_new(
        &self,
        state: &mut MeshState,
        from: &str,
        offer: SessionDescription,
        carried: Vec<IceCandidate>,
    ) {
        let mut session = match self.new_session(from).await {
            Ok(session) => session,
            Err(e) => {
                warn!(peer = from, error = %e, "Failed to create transport for inbound offer");
                self.emit(MeshEvent::Error(format!("transport for {from}: {e}")));
                return;
            }
        };
        session.adopt_candidates(carried);
        if let Some(early) = state.pending_candidates.remove(from) {
            session.adopt_candidates(early);
        }
        session.set_state(PeerState::OfferReceived);
        self.emit(MeshEvent::PeerConnecting {
            peer_id: from.to_string(),
        });

        if let Some(stream) = state.capture.stream() {
            attach_stream(&mut session, &stream).await;
        }

        let transport = session.transport();
        if let Err(e) = transport.set_remote_description(offer).await {
            warn!(peer = from, error = %e, "Failed to apply remote offer");
            state.sessions.insert(from.to_string(), session);
            return;
        }
        let drained = session.mark_remote_description_set();
        apply_candidates(from, transport.as_ref(), drained).await;

        if self.send_answer(&session).await {
            session.set_state(PeerState::DescriptionsSet);
        }
        info!(peer = from, state = ?session.state(), sends_audio = session.sends_audio(), "Inbound session opened");
        state.sessions.insert(from.to_string(), session);
    }

    /// Answer a new offer on an established session.
    async fn answer_renegotiation(
        &self,
        session: &mut PeerSession,
        offer: SessionDescription,
        stream: Option<SharedStream>,
    ) {
        if let Some(stream) = stream {
            attach_stream(session, &stream).await;
        }
        if let Err(e) = session.transport().set_remote_description(offer).await {
            warn!(peer = session.peer_id(), error = %e, "Failed to apply renegotiation offer");
            return;
        }
        info!(peer = session.peer_id(), "Answering renegotiation");
        self.send_answer(session).await;
    }

    /// Create, apply and send an answer. Returns whether it was applied.
    async fn send_answer(&self, session: &PeerSession) -> bool {
        let transport = session.transport();
        let answer = match transport.create_answer().await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(peer = session.peer_id(), error = %e, "Failed to create answer");
                return false;
            }
        };
        if let Err(e) = transport.set_local_description(answer.clone()).await {
            warn!(peer = session.peer_id(), error = %e, "Failed to apply local answer");
            return false;
        }
        if let Err(e) = self
            .signaling
            .send(&Signal::Answer(answer), session.peer_id())
            .await
        {
            warn!(peer = session.peer_id(), error = %e, "Failed to send answer");
        }
        true
    }

    pub(super) async fn on_answer(
        &self,
        state: &mut MeshState,
        from: &str,
        answer: SessionDescription,
    ) {
        let Some(session) = state.sessions.get_mut(from) else {
            debug!(peer = from, "Answer for unknown session");
            return;
        };
        if session.state() != PeerState::OfferSent {
            debug!(peer = from, state = ?session.state(), "Ignoring unexpected answer");
            return;
        }

        let transport = session.transport();
        if let Err(e) = transport.set_remote_description(answer).await {
            warn!(peer = from, error = %e, "Failed to apply remote answer");
            return;
        }
        let drained = session.mark_remote_description_set();
        apply_candidates(from, transport.as_ref(), drained).await;

        let next = if session.is_connected() {
            PeerState::Connected
        } else {
            PeerState::DescriptionsSet
        };
        session.set_state(next);
        debug!(peer = from, state = ?next, "Answer applied");
    }

    pub(super) async fn on_remote_candidate(
        &self,
        state: &mut MeshState,
        from: &str,
        candidate: IceCandidate,
    ) {
        match state.sessions.get_mut(from) {
            Some(session) => {
                if let Some(candidate) = session.accept_candidate(candidate) {
                    apply_candidates(from, session.transport().as_ref(), vec![candidate]).await;
                } else {
                    debug!(peer = from, queued = session.queued_len(), "Candidate queued");
                }
            }
            None => {
                let early = state.pending_candidates.entry(from.to_string()).or_default();
                early.push(candidate);
                debug!(peer = from, queued = early.len(), "Candidate queued before session");
            }
        }
    }
}

/// Add the local stream to a session's transport once.
async fn attach_stream(session: &mut PeerSession, stream: &SharedStream) -> bool {
    if session.sends_audio() {
        return true;
    }
    match session.transport().add_local_stream(Arc::clone(stream)).await {
        Ok(()) => {
            session.set_sends_audio(true);
            true
        }
        Err(e) => {
            warn!(peer = session.peer_id(), error = %e, "Failed to attach local audio");
            false
        }
    }
}

/// Apply remote candidates in order. Failures are logged and skipped.
async fn apply_candidates(peer_id: &str, transport: &dyn PeerTransport, candidates: Vec<IceCandidate>) {
    for candidate in candidates {
        if let Err(e) = transport.add_ice_candidate(candidate).await {
            warn!(peer = peer_id, error = %e, "Failed to add ICE candidate");
        }
    }
}
