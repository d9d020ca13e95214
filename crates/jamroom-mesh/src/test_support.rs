//! Test doubles for the media engine plus a polling helper.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::capture::{AudioConstraints, CaptureError, CaptureSource, MediaDevices};
use crate::media::{MediaStream, SharedStream};
use crate::playback::{AudioOutput, PlaybackError, PlaybackSink};
use crate::protocol::{IceCandidate, SdpType, SessionDescription};
use crate::transport::{
    ConnectionState, PeerTransport, TransportError, TransportEvent, TransportEvents,
    TransportFactory, TransportOptions,
};

/// Poll `check` every few milliseconds for up to two seconds.
pub(crate) async fn eventually<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct FakeStream {
    id: String,
    tracks: usize,
    level: Option<f32>,
    stopped: AtomicBool,
}

impl FakeStream {
    pub(crate) fn new(id: &str, tracks: usize) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            tracks,
            level: None,
            stopped: AtomicBool::new(false),
        })
    }

    pub(crate) fn with_level(id: &str, level: f32) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            tracks: 1,
            level: Some(level),
            stopped: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn audio_track_count(&self) -> usize {
        self.tracks
    }

    fn audio_level(&self) -> Option<f32> {
        self.level
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

/// What a fake capture call yields.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Tracks(usize),
    Fail(CaptureError),
}

pub(crate) struct FakeDevices {
    display: Outcome,
    microphone: Outcome,
    calls: Mutex<Vec<(CaptureSource, AudioConstraints)>>,
    produced: Mutex<Vec<(CaptureSource, Arc<FakeStream>)>>,
}

impl FakeDevices {
    pub(crate) fn new(display: Outcome, microphone: Outcome) -> Arc<Self> {
        Arc::new(Self {
            display,
            microphone,
            calls: Mutex::new(Vec::new()),
            produced: Mutex::new(Vec::new()),
        })
    }

    /// Display refused, microphone works.
    pub(crate) fn microphone_only() -> Arc<Self> {
        Self::new(
            Outcome::Fail(CaptureError::Denied("NotAllowedError".into())),
            Outcome::Tracks(1),
        )
    }

    pub(crate) fn calls(&self) -> Vec<CaptureSource> {
        self.calls.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    pub(crate) fn constraints(&self) -> Vec<AudioConstraints> {
        self.calls.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub(crate) fn produced(&self, source: CaptureSource) -> Vec<Arc<FakeStream>> {
        self.produced
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == source)
            .map(|(_, stream)| Arc::clone(stream))
            .collect()
    }

    fn yield_stream(
        &self,
        source: CaptureSource,
        outcome: &Outcome,
        constraints: &AudioConstraints,
    ) -> Result<SharedStream, CaptureError> {
        self.calls.lock().unwrap().push((source, constraints.clone()));
        match outcome {
            Outcome::Tracks(tracks) => {
                let stream = FakeStream::new(&format!("{source}-stream"), *tracks);
                self.produced
                    .lock()
                    .unwrap()
                    .push((source, Arc::clone(&stream)));
                let shared: SharedStream = stream;
                Ok(shared)
            }
            Outcome::Fail(e) => Err(e.clone()),
        }
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn get_display_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<SharedStream, CaptureError> {
        self.yield_stream(CaptureSource::Display, &self.display, constraints)
    }

    async fn get_user_media(
        &self,
        constraints: &AudioConstraints,
    ) -> Result<SharedStream, CaptureError> {
        self.yield_stream(CaptureSource::Microphone, &self.microphone, constraints)
    }
}

// ---------------------------------------------------------------------------
// Transports
// ---------------------------------------------------------------------------

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    AddLocalStream(String),
    CreateOffer,
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddCandidate(String),
    Close,
}

/// Transport double that records every call in order.
///
/// With `auto_connect`, it reports `Connected` once both descriptions are
/// applied.
pub(crate) struct RecordingTransport {
    peer_id: String,
    events: Option<TransportEvents>,
    auto_connect: bool,
    fail_negotiation: bool,
    calls: Mutex<Vec<Call>>,
    closed: AtomicBool,
    local_set: AtomicBool,
    remote_set: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn new(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            events: None,
            auto_connect: false,
            fail_negotiation: false,
            calls: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            local_set: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Candidate strings in the order they were applied.
    pub(crate) fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.events.as_ref().map(|e| e.generation()).unwrap_or(0)
    }

    /// Emit an event as the media engine would.
    pub(crate) fn emit(&self, event: TransportEvent) -> bool {
        self.events.as_ref().is_some_and(|e| e.emit(event))
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, what: &str) -> Result<(), TransportError> {
        if self.fail_negotiation {
            Err(TransportError::Negotiation(format!("{what} rejected")))
        } else {
            Ok(())
        }
    }

    fn maybe_connect(&self) {
        if self.auto_connect
            && self.local_set.load(Ordering::SeqCst)
            && self.remote_set.load(Ordering::SeqCst)
        {
            self.emit(TransportEvent::ConnectionStateChanged(
                ConnectionState::Connected,
            ));
        }
    }
}

#[async_trait]
impl PeerTransport for RecordingTransport {
    async fn add_local_stream(&self, stream: SharedStream) -> Result<(), TransportError> {
        self.record(Call::AddLocalStream(stream.id().to_string()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.record(Call::CreateOffer);
        self.check("offer")?;
        Ok(SessionDescription::offer(format!("offer-to-{}", self.peer_id)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.record(Call::CreateAnswer);
        self.check("answer")?;
        Ok(SessionDescription::answer(format!("answer-to-{}", self.peer_id)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.record(Call::SetLocal(desc.sdp_type));
        self.local_set.store(true, Ordering::SeqCst);
        self.maybe_connect();
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), TransportError> {
        self.record(Call::SetRemote(desc.sdp_type));
        self.check("remote description")?;
        self.remote_set.store(true, Ordering::SeqCst);
        self.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.record(Call::AddCandidate(candidate.candidate));
        Ok(())
    }

    async fn close(&self) {
        self.record(Call::Close);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory that keeps every transport it creates.
#[derive(Default)]
pub(crate) struct RecordingFactory {
    created: Mutex<Vec<Arc<RecordingTransport>>>,
    options: Mutex<Vec<TransportOptions>>,
    auto_connect: AtomicBool,
    fail_create: AtomicBool,
    fail_negotiation: AtomicBool,
}

impl RecordingFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn auto_connecting() -> Arc<Self> {
        let factory = Self::default();
        factory.auto_connect.store(true, Ordering::SeqCst);
        Arc::new(factory)
    }

    pub(crate) fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_negotiation(&self, fail: bool) {
        self.fail_negotiation.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn created(&self) -> Vec<Arc<RecordingTransport>> {
        self.created.lock().unwrap().clone()
    }

    pub(crate) fn created_for(&self, peer_id: &str) -> Vec<Arc<RecordingTransport>> {
        self.created()
            .into_iter()
            .filter(|t| t.peer_id == peer_id)
            .collect()
    }

    pub(crate) fn last_for(&self, peer_id: &str) -> Option<Arc<RecordingTransport>> {
        self.created_for(peer_id).pop()
    }

    pub(crate) fn options(&self) -> Vec<TransportOptions> {
        self.options.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportFactory for RecordingFactory {
    async fn create(
        &self,
        options: &TransportOptions,
        events: TransportEvents,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::Create("no ICE agent".into()));
        }
        self.options.lock().unwrap().push(options.clone());

        let mut transport = RecordingTransport::new(events.peer_id());
        transport.auto_connect = self.auto_connect.load(Ordering::SeqCst);
        transport.fail_negotiation = self.fail_negotiation.load(Ordering::SeqCst);
        transport.events = Some(events);
        let transport = Arc::new(transport);
        self.created.lock().unwrap().push(Arc::clone(&transport));
        let shared: Arc<dyn PeerTransport> = transport;
        Ok(shared)
    }
}

// ---------------------------------------------------------------------------
// Audio output
// ---------------------------------------------------------------------------

/// Observable state of one fake sink.
#[derive(Debug)]
pub(crate) struct SinkLog {
    pub(crate) peer_id: String,
    pub(crate) stream_id: String,
    plays: AtomicUsize,
    paused: AtomicBool,
    detached: AtomicBool,
}

impl SinkLog {
    pub(crate) fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

struct FakeSink {
    log: Arc<SinkLog>,
    blocked: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
}

#[async_trait]
impl PlaybackSink for FakeSink {
    async fn play(&self) -> Result<(), PlaybackError> {
        self.log.plays.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            return Err(PlaybackError::Device("no output device".into()));
        }
        if self.blocked.load(Ordering::SeqCst) {
            return Err(PlaybackError::AutoplayBlocked);
        }
        self.log.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.log.paused.store(true, Ordering::SeqCst);
    }

    fn detach(&self) {
        self.log.detached.store(true, Ordering::SeqCst);
    }
}

/// Audio output whose sinks can be made to hit the autoplay policy.
#[derive(Default)]
pub(crate) struct FakeAudioOutput {
    blocked: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
    sinks: Mutex<Vec<Arc<SinkLog>>>,
}

impl FakeAudioOutput {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    pub(crate) fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub(crate) fn sinks(&self) -> Vec<Arc<SinkLog>> {
        self.sinks.lock().unwrap().clone()
    }

    pub(crate) fn sinks_for(&self, peer_id: &str) -> Vec<Arc<SinkLog>> {
        self.sinks()
            .into_iter()
            .filter(|s| s.peer_id == peer_id)
            .collect()
    }
}

impl AudioOutput for FakeAudioOutput {
    fn create_sink(&self, peer_id: &str, stream: SharedStream) -> Box<dyn PlaybackSink> {
        let log = Arc::new(SinkLog {
            peer_id: peer_id.to_string(),
            stream_id: stream.id().to_string(),
            plays: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        });
        self.sinks.lock().unwrap().push(Arc::clone(&log));
        Box::new(FakeSink {
            log,
            blocked: Arc::clone(&self.blocked),
            broken: Arc::clone(&self.broken),
        })
    }
}
