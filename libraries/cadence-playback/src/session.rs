//! Playback session
//!
//! A [`Session`] is the one context object a host creates per listening
//! session. It owns the media output (through the engine), the queue, the
//! auto-queue controller, the resilience layer, the persistence bridge and
//! the timer queue, and it is the only place those pieces meet.
//!
//! The host drives it from its event loop:
//! - user actions call the operation methods
//! - backend notifications go to [`Session::handle_backend_event`]
//! - elapsed wall-clock time goes to [`Session::advance`]
//! - [`Session::pump`] merges finished recommendation fetches
//! - [`Session::drain_events`] hands back what changed

use crate::auto_queue::AutoQueueController;
use crate::config::PlaybackConfig;
use crate::engine::{EngineSignal, LoadOutcome, PlaybackEngine};
use crate::error::{PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::output::{BackendEvent, MediaBackend, MediaEvent, MediaOutput, OutputHandle};
use crate::persistence::{PersistedQueueState, PersistenceBridge, QUEUE_STATE_VERSION};
use crate::queue::{AddOutcome, QueueManager};
use crate::resilience::{CorrectionTrigger, ResilienceLayer};
use crate::timer::{TimerQueue, TimerSlot};
use crate::types::{PlaybackState, PlayerSnapshot, RepeatMode};
use cadence_core::{
    validate_track, CoreError, KeyValueStore, PlayRecorder, PreferencesService,
    RecommendationRequest, RecommendationService, SmartQueueSettings, Track, TrackId,
    TrackValidation,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Position past which "previous" restarts the current track
const RESTART_THRESHOLD_SECS: f64 = 3.0;

type FetchResult = std::result::Result<Vec<Track>, CoreError>;

/// One listening session
pub struct Session {
    engine: PlaybackEngine,
    queue: QueueManager,
    auto_queue: AutoQueueController,
    resilience: ResilienceLayer,
    persistence: PersistenceBridge,
    timers: TimerQueue,
    repeat_mode: RepeatMode,

    recommendations: Option<Arc<dyn RecommendationService>>,
    recorder: Option<Arc<dyn PlayRecorder>>,
    fetch_tx: mpsc::UnboundedSender<FetchResult>,
    fetch_rx: mpsc::UnboundedReceiver<FetchResult>,

    pending_events: Vec<PlayerEvent>,
    torn_down: bool,
}

impl Session {
    /// Create a session and restore whatever `store` holds
    pub fn new(
        config: PlaybackConfig,
        backend: Box<dyn MediaBackend>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;

        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        let mut session = Self {
            engine: PlaybackEngine::new(&config, MediaOutput::new(backend)),
            queue: QueueManager::new(config.history_size),
            auto_queue: AutoQueueController::new(&config),
            resilience: ResilienceLayer::new(&config),
            persistence: PersistenceBridge::new(&config, store),
            timers: TimerQueue::new(),
            repeat_mode: RepeatMode::Off,
            recommendations: None,
            recorder: None,
            fetch_tx,
            fetch_rx,
            pending_events: Vec::new(),
            torn_down: false,
        };

        session.restore();
        session.resilience.start(&mut session.timers);
        session.apply_rate();
        Ok(session)
    }

    /// Attach the recommendation collaborator used by auto-queue
    #[must_use]
    pub fn with_recommendations(mut self, service: Arc<dyn RecommendationService>) -> Self {
        self.recommendations = Some(service);
        self
    }

    /// Attach the play-history collaborator
    #[must_use]
    pub fn with_play_recorder(mut self, recorder: Arc<dyn PlayRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    fn restore(&mut self) {
        if let Some(volume) = self.persistence.load_volume() {
            self.engine.set_volume(volume);
        }
        if let Some(rate) = self.persistence.load_playback_rate() {
            if let Err(err) = self.resilience.set_intended_rate(rate) {
                tracing::warn!(error = %err, "ignoring stored playback rate");
            }
        }

        let Some(state) = self.persistence.load_queue_state() else {
            return;
        };
        tracing::info!(
            queued = state.queued_tracks.len(),
            history = state.history.len(),
            has_current = state.current_track.is_some(),
            "restoring session"
        );

        self.repeat_mode = state.repeat_mode;
        self.auto_queue.restore_state(state.smart_queue_state);
        self.queue.restore(
            state.current_track.clone(),
            state.queued_tracks,
            state.history,
            state.is_shuffled,
        );

        if let Some(track) = state.current_track {
            if let LoadOutcome::Started(_) = self.engine.load(&track, false, &mut self.timers) {
                self.engine.seek_when_ready(state.current_time);
            }
        }
        // Restoring is not a user change; nothing needs writing back.
        self.engine.drain_events();
    }

    // ===== Queries =====

    /// Point-in-time copy of the whole player state
    pub fn snapshot(&self) -> PlayerSnapshot {
        let volume = self.engine.volume();
        PlayerSnapshot {
            current_track: self.queue.current().cloned(),
            queue: self.queue.entries().to_vec(),
            history: self.queue.history().to_vec(),
            state: self.engine.state(),
            current_time: self.engine.position(),
            duration: self.engine.duration(),
            volume: volume.level(),
            is_muted: volume.is_muted(),
            is_shuffled: self.queue.is_shuffled(),
            repeat_mode: self.repeat_mode,
            playback_rate: self.resilience.intended_rate(),
            is_loading: self.engine.is_loading(),
            is_auto_queueing: self.auto_queue.is_auto_queueing(),
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.queue.current()
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn playback_rate(&self) -> f64 {
        self.resilience.intended_rate()
    }

    pub fn is_auto_queueing(&self) -> bool {
        self.auto_queue.is_auto_queueing()
    }

    /// Stable handle for the equalizer to attach to
    pub fn output_handle(&self) -> OutputHandle {
        self.engine.output_handle()
    }

    /// Number of armed timers
    pub fn pending_timer_count(&self) -> usize {
        self.timers.pending_count()
    }

    /// Take every event emitted since the last call
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        self.collect_engine_events();
        std::mem::take(&mut self.pending_events)
    }

    // ===== Transport =====

    /// Make `track` current and start playing it
    ///
    /// A track that failed earlier this session is refused without touching
    /// the queue or history.
    pub fn load_track(&mut self, track: Track) -> LoadOutcome {
        if self.engine.is_failed(track.id) {
            tracing::debug!(track_id = %track.id, "skipping previously failed track");
            return LoadOutcome::Suppressed;
        }
        let previous = self.queue.set_current(track.clone());
        self.start_track(&track, previous)
    }

    fn start_track(&mut self, track: &Track, previous: Option<TrackId>) -> LoadOutcome {
        self.emit(PlayerEvent::TrackChanged {
            track_id: track.id,
            previous,
        });
        let outcome = self.engine.load(track, true, &mut self.timers);
        if matches!(outcome, LoadOutcome::Started(_)) {
            self.record_play(track);
        }
        self.queue_changed();
        outcome
    }

    /// Start or resume playback
    ///
    /// With nothing loaded, or after the last track ended, playback starts
    /// from the queue head.
    pub fn play(&mut self) -> Result<()> {
        if self.engine.loaded_track().is_none() {
            if let Some(current) = self.queue.current().cloned() {
                return match self.start_track(&current, None) {
                    LoadOutcome::Started(_) => Ok(()),
                    LoadOutcome::Suppressed | LoadOutcome::Failed => Err(
                        PlaybackError::InvalidOperation(format!("track {} cannot be played", current.id)),
                    ),
                };
            }
            return match self.play_next() {
                Some(_) => Ok(()),
                None => Err(PlaybackError::NoTrackLoaded),
            };
        }
        if self.engine.state() == PlaybackState::Idle && self.play_next().is_some() {
            return Ok(());
        }
        let result = self.engine.play();
        self.collect_engine_events();
        self.persistence.schedule(&mut self.timers);
        result
    }

    pub fn pause(&mut self) {
        self.engine.pause();
        self.collect_engine_events();
        self.persistence.schedule(&mut self.timers);
    }

    pub fn toggle_play(&mut self) -> Result<()> {
        if self.engine.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Jump to `seconds` in the current track
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let result = self.engine.seek(seconds);
        self.position_moved(&result);
        result
    }

    pub fn skip_forward(&mut self, seconds: f64) -> Result<()> {
        let result = self.engine.skip_by(seconds.abs());
        self.position_moved(&result);
        result
    }

    pub fn skip_backward(&mut self, seconds: f64) -> Result<()> {
        let result = self.engine.skip_by(-seconds.abs());
        self.position_moved(&result);
        result
    }

    fn position_moved(&mut self, result: &Result<()>) {
        self.collect_engine_events();
        if result.is_ok() {
            self.persistence.schedule(&mut self.timers);
        }
    }

    /// Advance to the queue head; `None` when the queue is empty
    ///
    /// Queued tracks that already failed this session are dropped on the way.
    pub fn play_next(&mut self) -> Option<LoadOutcome> {
        while let Some(head) = self.queue.entries().first() {
            if !self.engine.is_failed(head.track.id) {
                break;
            }
            tracing::debug!(track_id = %head.track.id, "dropping failed track from queue head");
            if self.queue.remove(0).is_err() {
                break;
            }
        }
        let previous = self.queue.current().map(|t| t.id);
        let next = self.queue.play_next()?;
        Some(self.start_track(&next, previous))
    }

    /// Go back one track, or restart the current one if it is past 3 seconds
    pub fn play_previous(&mut self) -> Result<Option<LoadOutcome>> {
        if self.engine.loaded_track().is_some() && self.engine.position() > RESTART_THRESHOLD_SECS {
            self.seek(0.0)?;
            return Ok(None);
        }
        let previous = self.queue.current().map(|t| t.id);
        match self.queue.play_previous() {
            Some(track) => Ok(Some(self.start_track(&track, previous))),
            None => {
                if self.engine.loaded_track().is_some() {
                    self.seek(0.0)?;
                }
                Ok(None)
            }
        }
    }

    /// Jump to the queue entry at `index`
    pub fn play_from_queue(&mut self, index: usize) -> Result<LoadOutcome> {
        let previous = self.queue.current().map(|t| t.id);
        let target = self.queue.play_from_queue(index)?;
        Ok(self.start_track(&target, previous))
    }

    fn on_track_end(&mut self) {
        if self.repeat_mode == RepeatMode::One {
            tracing::debug!("repeat-one: replaying current track");
            self.engine.replay();
            return;
        }
        if self.play_next().is_some() {
            return;
        }

        self.engine.finish();
        if self.repeat_mode == RepeatMode::All && !self.queue.history().is_empty() {
            let length = self.queue.wrap_history();
            tracing::info!(length, "repeat-all: queue rebuilt from history");
            self.emit(PlayerEvent::QueueWrapped { length });
            self.queue_changed();
        } else {
            self.emit(PlayerEvent::PlaybackEnded);
        }
    }

    // ===== Queue =====

    /// Append tracks, optionally skipping ones already current or queued
    pub fn add_to_queue(&mut self, tracks: Vec<Track>, check_duplicates: bool) -> AddOutcome {
        let outcome = self.queue.add_to_queue(tracks, check_duplicates);
        for track in &outcome.rejected {
            tracing::debug!(track_id = %track.id, "duplicate rejected");
            self.emit(PlayerEvent::DuplicateRejected {
                track_id: track.id,
                title: track.title.clone(),
            });
        }
        if outcome.added > 0 {
            self.queue_changed();
        }
        outcome
    }

    /// Queue tracks to play right after the current one
    pub fn add_to_play_next(&mut self, tracks: Vec<Track>) -> usize {
        let added = self.queue.add_to_play_next(tracks);
        if added > 0 {
            self.queue_changed();
        }
        added
    }

    pub fn remove_from_queue(&mut self, index: usize) -> Result<()> {
        self.queue.remove(index)?;
        self.queue_changed();
        Ok(())
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
        self.queue_changed();
    }

    pub fn reorder_queue(&mut self, from: usize, to: usize) -> Result<()> {
        self.queue.reorder(from, to)?;
        self.queue_changed();
        Ok(())
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        if self.queue.is_shuffled() != enabled {
            self.queue.set_shuffle(enabled);
            self.queue_changed();
        }
    }

    /// Flip shuffle; returns the new state
    pub fn toggle_shuffle(&mut self) -> bool {
        let enabled = self.queue.toggle_shuffle();
        self.queue_changed();
        enabled
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
        self.persistence.schedule(&mut self.timers);
    }

    /// Step through none -> all -> one
    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.set_repeat_mode(self.repeat_mode.cycle());
        self.repeat_mode
    }

    fn queue_changed(&mut self) {
        self.emit(PlayerEvent::QueueChanged {
            length: self.queue.len(),
        });
        self.maybe_auto_queue();
        self.persistence.schedule(&mut self.timers);
    }

    // ===== Volume and rate =====

    /// Set volume; returns the clamped level
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let applied = self.engine.set_volume(volume);
        self.collect_engine_events();
        self.persistence.schedule(&mut self.timers);
        applied
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.engine.set_muted(muted);
        self.collect_engine_events();
    }

    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.engine.toggle_mute();
        self.collect_engine_events();
        muted
    }

    /// User-requested playback rate (0.25-4.0)
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.resilience.set_intended_rate(rate)?;
        self.apply_rate();
        self.persistence.schedule(&mut self.timers);
        Ok(())
    }

    fn apply_rate(&mut self) {
        self.engine.apply_rate(self.resilience.intended_rate());
    }

    // ===== Auto-queue =====

    /// Replace smart-queue settings; `None` disables auto-queue
    pub fn set_smart_queue_settings(&mut self, settings: Option<SmartQueueSettings>) {
        self.auto_queue.set_settings(settings);
        self.maybe_auto_queue();
    }

    /// Fetch smart-queue settings from the preferences collaborator
    ///
    /// A failing or empty response disables auto-queue.
    pub async fn apply_preferences(&mut self, preferences: &dyn PreferencesService) {
        let settings = match preferences.smart_queue_settings().await {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load smart-queue settings");
                None
            }
        };
        self.set_smart_queue_settings(settings);
    }

    fn maybe_auto_queue(&mut self) {
        if self.recommendations.is_none() || self.torn_down {
            return;
        }
        if let Some(request) = self.auto_queue.evaluate(&self.queue) {
            self.emit(PlayerEvent::AutoQueueStarted);
            self.spawn_fetch(request);
        }
    }

    fn spawn_fetch(&mut self, request: RecommendationRequest) {
        let Some(service) = self.recommendations.clone() else {
            self.auto_queue.abandon(&mut self.timers);
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("no async runtime; skipping auto-queue fetch");
            self.auto_queue.abandon(&mut self.timers);
            self.emit(PlayerEvent::AutoQueueFinished { added: 0 });
            return;
        };

        let tx = self.fetch_tx.clone();
        handle.spawn(async move {
            let result = service.fetch_recommendations(request).await;
            // The session may be gone by now; nothing to deliver to.
            let _ = tx.send(result);
        });
    }

    /// Merge any finished recommendation fetches; returns tracks added
    pub fn pump(&mut self) -> usize {
        if self.torn_down {
            return 0;
        }
        let mut added = 0;
        while let Ok(result) = self.fetch_rx.try_recv() {
            added += self.complete_fetch(result);
        }
        added
    }

    /// Wait for the outstanding fetch, if any, and merge it
    pub async fn await_auto_queue(&mut self) -> Option<usize> {
        if self.torn_down || !self.auto_queue.is_auto_queueing() {
            return None;
        }
        let result = self.fetch_rx.recv().await?;
        Some(self.complete_fetch(result))
    }

    fn complete_fetch(&mut self, result: FetchResult) -> usize {
        let added = self
            .auto_queue
            .complete(result, &mut self.queue, &mut self.timers);
        self.emit(PlayerEvent::AutoQueueFinished { added });
        if added > 0 {
            self.emit(PlayerEvent::QueueChanged {
                length: self.queue.len(),
            });
            self.persistence.schedule(&mut self.timers);
        }
        added
    }

    // ===== Host notifications =====

    /// Feed a backend notification through load fencing into the engine
    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        let Some(event) = self.engine.output().accept(event) else {
            return;
        };
        let playhead_only = matches!(event, MediaEvent::TimeUpdate { .. });
        let state_before = self.engine.state();

        let signal = self.engine.handle_event(event, &mut self.timers);
        self.collect_engine_events();
        if playhead_only {
            self.persistence.touch(&mut self.timers);
        } else if self.engine.state() != state_before {
            self.persistence.schedule(&mut self.timers);
        }
        match signal {
            Some(EngineSignal::TrackEnded) => self.on_track_end(),
            Some(EngineSignal::RateChanged) => self.correct_drift(CorrectionTrigger::RateChange),
            None => {}
        }
    }

    /// Page or app visibility changed
    pub fn on_visibility_change(&mut self, visible: bool) {
        if visible {
            self.correct_drift(CorrectionTrigger::Visible);
        }
    }

    /// OS resumed from sleep
    pub fn on_resume(&mut self) {
        self.correct_drift(CorrectionTrigger::Resume);
    }

    /// Page restored from the back/forward cache
    pub fn on_page_show(&mut self) {
        self.correct_drift(CorrectionTrigger::PageShow);
    }

    fn correct_drift(&mut self, trigger: CorrectionTrigger) {
        if let Some(event) = self.resilience.check(&mut self.engine, trigger) {
            self.emit(event);
        }
    }

    /// Move session time forward and run every timer that came due
    pub fn advance(&mut self, elapsed: Duration) {
        if self.torn_down {
            return;
        }
        for slot in self.timers.advance(elapsed) {
            match slot {
                TimerSlot::LoadRetry => {
                    self.engine.on_retry_due(&mut self.timers);
                    self.collect_engine_events();
                }
                TimerSlot::AutoQueueCooldown => self.auto_queue.release_guard(),
                TimerSlot::PersistDebounce => self.flush(),
                TimerSlot::DriftCheck => self.correct_drift(CorrectionTrigger::Interval),
            }
        }
    }

    fn persisted_state(&self) -> PersistedQueueState {
        PersistedQueueState {
            version: QUEUE_STATE_VERSION,
            queued_tracks: self.queue.entries().to_vec(),
            smart_queue_state: self.auto_queue.state().clone(),
            history: self.queue.history().to_vec(),
            current_track: self.queue.current().cloned(),
            current_time: self.engine.position(),
            is_shuffled: self.queue.is_shuffled(),
            repeat_mode: self.repeat_mode,
        }
    }

    fn flush(&mut self) {
        let state = self.persisted_state();
        let volume = self.engine.volume().level();
        let rate = self.resilience.intended_rate();
        self.persistence.flush(&state, volume, rate);
        tracing::debug!(queued = state.queued_tracks.len(), "session state persisted");
    }

    fn record_play(&self, track: &Track) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        let track = match validate_track(track) {
            TrackValidation::Valid(track) => track,
            TrackValidation::Invalid(issues) => {
                tracing::debug!(track_id = %track.id, ?issues, "not recording incomplete track");
                return;
            }
        };
        let Ok(handle) = Handle::try_current() else {
            tracing::debug!(track_id = %track.id, "no async runtime; play not recorded");
            return;
        };
        handle.spawn(async move {
            if let Err(err) = recorder.record_play(&track, track.duration).await {
                tracing::warn!(track_id = %track.id, error = %err, "failed to record play");
            }
        });
    }

    // ===== Lifecycle =====

    /// Stop everything: timers, output and pending fetches
    ///
    /// Pending state is flushed first. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if self.persistence.is_dirty() {
            self.flush();
        }
        self.timers.cancel_all();
        self.resilience.stop(&mut self.timers);
        self.auto_queue.reset();
        self.engine.shutdown();
        self.collect_engine_events();
        self.torn_down = true;
        tracing::debug!("session torn down");
    }

    fn emit(&mut self, event: PlayerEvent) {
        self.collect_engine_events();
        self.pending_events.push(event);
    }

    fn collect_engine_events(&mut self) {
        self.pending_events.extend(self.engine.drain_events());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.engine.state())
            .field("current", &self.queue.current().map(|t| t.id))
            .field("queued", &self.queue.len())
            .field("repeat_mode", &self.repeat_mode)
            .field("timers", &self.timers.pending_count())
            .finish_non_exhaustive()
    }
}
