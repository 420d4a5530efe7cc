//! Shared fakes for integration tests

use async_trait::async_trait;
use cadence_core::{
    AlbumRef, ArtistRef, CoreError, KeyValueStore, MemoryStore, PlayRecorder, PreferencesService,
    RecommendationRequest, RecommendationService, SmartQueueSettings, Track, TrackId,
};
use cadence_playback::{
    BackendEvent, LoadId, LoadRequest, MediaBackend, MediaError, MediaEvent, OutputHandle,
    PlaybackConfig, Session,
};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

// ===== Tracing =====

/// Install a test-writer subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ===== Tracks =====

pub fn track(id: i64) -> Track {
    Track::new(
        TrackId::new(id),
        format!("Track {}", id),
        ArtistRef::new(id % 5, format!("Artist {}", id % 5)),
        AlbumRef::new(id / 10, format!("Album {}", id / 10)),
        200.0,
    )
    .with_preview_url(format!("https://cdn.test/preview/{}.mp3", id))
}

pub fn tracks(ids: impl IntoIterator<Item = i64>) -> Vec<Track> {
    ids.into_iter().map(track).collect()
}

pub fn enabled_settings(threshold: usize) -> SmartQueueSettings {
    SmartQueueSettings {
        auto_queue_enabled: true,
        auto_queue_threshold: threshold,
        ..SmartQueueSettings::default()
    }
}

// ===== Media backend =====

#[derive(Debug)]
pub struct BackendState {
    pub loads: Vec<LoadRequest>,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub fail_loads: Vec<MediaError>,
    pub fail_play: Option<MediaError>,
    pub position: f64,
    pub duration: Option<f64>,
    pub volume: f32,
    pub muted: bool,
    pub rate: f64,
    pub default_rate: f64,
    pub preserves_pitch: bool,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            loads: Vec::new(),
            play_calls: 0,
            pause_calls: 0,
            fail_loads: Vec::new(),
            fail_play: None,
            position: 0.0,
            duration: None,
            volume: 1.0,
            muted: false,
            rate: 1.0,
            default_rate: 1.0,
            preserves_pitch: true,
        }
    }
}

/// Media backend whose state the test can inspect and poke
#[derive(Clone, Default)]
pub struct FakeBackend(Arc<Mutex<BackendState>>);

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.0.lock().unwrap()
    }

    /// Id of the most recent load request
    pub fn last_load_id(&self) -> LoadId {
        self.state().loads.last().map(|l| l.load_id).unwrap()
    }

    pub fn load_count(&self) -> usize {
        self.state().loads.len()
    }

    /// Event tagged with the most recent load
    pub fn event(&self, event: MediaEvent) -> BackendEvent {
        BackendEvent::new(self.last_load_id(), event)
    }
}

impl MediaBackend for FakeBackend {
    fn handle(&self) -> OutputHandle {
        OutputHandle(1)
    }

    fn load(&mut self, request: &LoadRequest) -> Result<(), MediaError> {
        let mut state = self.state();
        state.loads.push(request.clone());
        state.position = 0.0;
        if state.fail_loads.is_empty() {
            Ok(())
        } else {
            Err(state.fail_loads.remove(0))
        }
    }

    fn play(&mut self) -> Result<(), MediaError> {
        let mut state = self.state();
        state.play_calls += 1;
        state.fail_play.take().map_or(Ok(()), Err)
    }

    fn pause(&mut self) {
        self.state().pause_calls += 1;
    }

    fn position(&self) -> f64 {
        self.state().position
    }

    fn set_position(&mut self, seconds: f64) {
        self.state().position = seconds;
    }

    fn duration(&self) -> Option<f64> {
        self.state().duration
    }

    fn volume(&self) -> f32 {
        self.state().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.state().volume = volume;
    }

    fn muted(&self) -> bool {
        self.state().muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.state().muted = muted;
    }

    fn playback_rate(&self) -> f64 {
        self.state().rate
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.state().rate = rate;
    }

    fn default_playback_rate(&self) -> f64 {
        self.state().default_rate
    }

    fn set_default_playback_rate(&mut self, rate: f64) {
        self.state().default_rate = rate;
    }

    fn preserves_pitch(&self) -> bool {
        self.state().preserves_pitch
    }

    fn set_preserves_pitch(&mut self, preserve: bool) {
        self.state().preserves_pitch = preserve;
    }
}

// ===== Storage =====

/// Memory store that counts writes per key
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn writes_to(&self, key: &str) -> usize {
        self.writes.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> cadence_core::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: Value) -> cadence_core::Result<()> {
        self.writes.lock().unwrap().push(key.to_string());
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> cadence_core::Result<()> {
        self.inner.remove(key)
    }
}

// ===== Collaborators =====

/// Returns a fixed list of tracks, counting calls
pub struct FixedRecommendations {
    pub tracks: Vec<Track>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<RecommendationRequest>>,
}

impl FixedRecommendations {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationService for FixedRecommendations {
    async fn fetch_recommendations(
        &self,
        request: RecommendationRequest,
    ) -> cadence_core::Result<Vec<Track>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let count = request.count;
        self.requests.lock().unwrap().push(request);
        Ok(self.tracks.iter().take(count).cloned().collect())
    }
}

/// Blocks every fetch until the test opens the gate
pub struct GatedRecommendations {
    pub tracks: Vec<Track>,
    pub calls: AtomicUsize,
    pub gate: Notify,
}

impl GatedRecommendations {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecommendationService for GatedRecommendations {
    async fn fetch_recommendations(
        &self,
        _request: RecommendationRequest,
    ) -> cadence_core::Result<Vec<Track>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        Ok(self.tracks.clone())
    }
}

/// Always fails
pub struct FailingRecommendations;

#[async_trait]
impl RecommendationService for FailingRecommendations {
    async fn fetch_recommendations(
        &self,
        _request: RecommendationRequest,
    ) -> cadence_core::Result<Vec<Track>> {
        Err(CoreError::service_unavailable("catalog unreachable"))
    }
}

pub struct StaticPreferences(pub Option<SmartQueueSettings>);

#[async_trait]
impl PreferencesService for StaticPreferences {
    async fn smart_queue_settings(&self) -> cadence_core::Result<Option<SmartQueueSettings>> {
        Ok(self.0.clone())
    }
}

/// Remembers every recorded play
#[derive(Default)]
pub struct RecordingRecorder {
    pub plays: Mutex<Vec<TrackId>>,
}

impl RecordingRecorder {
    pub fn plays(&self) -> Vec<TrackId> {
        self.plays.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayRecorder for RecordingRecorder {
    async fn record_play(&self, track: &Track, _duration_secs: f64) -> cadence_core::Result<()> {
        self.plays.lock().unwrap().push(track.id);
        Ok(())
    }
}

// ===== Sessions =====

/// Session over a fresh backend and in-memory store
pub fn session() -> (Session, FakeBackend) {
    session_with_store(Arc::new(MemoryStore::new()))
}

pub fn session_with_store(store: Arc<dyn KeyValueStore>) -> (Session, FakeBackend) {
    init_tracing();
    let backend = FakeBackend::new();
    let session = Session::new(
        PlaybackConfig::default(),
        Box::new(backend.clone()),
        store,
    )
    .unwrap();
    (session, backend)
}

/// Ids of the queued tracks, in order
pub fn queue_ids(session: &Session) -> Vec<i64> {
    session
        .queue()
        .entries()
        .iter()
        .map(|e| e.track.id.get())
        .collect()
}

pub fn history_ids(session: &Session) -> Vec<i64> {
    session
        .queue()
        .history()
        .iter()
        .map(|t| t.id.get())
        .collect()
}

pub fn current_id(session: &Session) -> Option<i64> {
    session.current_track().map(|t| t.id.get())
}
