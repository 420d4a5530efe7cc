//! Playback engine
//!
//! State machine over the media output: `Idle -> Loading -> Playing <-> Paused`,
//! with `Error` for tracks that failed terminally.
//!
//! Every load gets a fresh [`LoadId`]. The output adapter only lets events for
//! the newest id through, and the engine cancels the previous load's retry
//! timer before starting a new one, so a superseded load can neither change
//! state nor retry.
//!
//! Retries use exponential backoff (`base * 2^attempt`). The budget belongs to
//! the load id: recovering mid-track does not refill it. Once it is spent, or
//! on an error classified as terminal, the track id joins the session's
//! failed set and later loads of it are refused outright.

use crate::config::PlaybackConfig;
use crate::error::{FailureKind, MediaError, MediaErrorKind, PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::output::{MediaEvent, MediaOutput, OutputHandle};
use crate::timer::{TimerQueue, TimerSlot};
use crate::types::{LoadId, PlaybackState};
use crate::volume::Volume;
use cadence_core::{Track, TrackId};
use std::collections::HashSet;

/// What [`PlaybackEngine::load`] did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Source assigned under this id
    Started(LoadId),
    /// Track is in the failed set; nothing happened
    Suppressed,
    /// Track failed terminally before any source was assigned
    Failed,
}

/// Engine-level signal the session must act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineSignal {
    /// Current track finished naturally
    TrackEnded,
    /// Output reported a playback-rate change
    RateChanged,
}

#[derive(Debug, Clone)]
struct ActiveLoad {
    load_id: LoadId,
    track: Track,
    url: String,
    attempt: u32,
    autoplay: bool,
}

/// Finite-state controller around the media output
#[derive(Debug)]
pub struct PlaybackEngine {
    output: MediaOutput,
    config: PlaybackConfig,

    state: PlaybackState,
    last_load: LoadId,
    active: Option<ActiveLoad>,
    failed: HashSet<TrackId>,

    position: f64,
    duration: f64,
    pending_seek: Option<f64>,
    volume: Volume,

    pending_events: Vec<PlayerEvent>,
}

impl PlaybackEngine {
    /// Create an engine driving `output`
    pub fn new(config: &PlaybackConfig, mut output: MediaOutput) -> Self {
        let volume = Volume::new(config.initial_volume);
        output.set_volume(volume.level());
        output.set_muted(false);
        output.set_preserves_pitch(true);

        Self {
            output,
            config: config.clone(),
            state: PlaybackState::Idle,
            last_load: LoadId::default(),
            active: None,
            failed: HashSet::new(),
            position: 0.0,
            duration: 0.0,
            pending_seek: None,
            volume,
            pending_events: Vec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.state == PlaybackState::Loading
    }

    /// Position in seconds as last reported by the output
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Read-only view of the output, for drift checks and snapshots
    pub fn output(&self) -> &MediaOutput {
        &self.output
    }

    /// Handle the equalizer taps
    pub fn output_handle(&self) -> OutputHandle {
        self.output.handle()
    }

    /// Id of the newest load attempt
    pub fn current_load(&self) -> Option<LoadId> {
        self.active.as_ref().map(|a| a.load_id)
    }

    /// Track the engine is currently driving
    pub fn loaded_track(&self) -> Option<&Track> {
        self.active.as_ref().map(|a| &a.track)
    }

    /// Whether `id` failed terminally this session
    pub fn is_failed(&self, id: TrackId) -> bool {
        self.failed.contains(&id)
    }

    /// Take all pending events
    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Load `track` under a fresh load id
    ///
    /// Cancels any pending retry of the previous load. With `autoplay`,
    /// playback starts as soon as the source is accepted.
    pub fn load(&mut self, track: &Track, autoplay: bool, timers: &mut TimerQueue) -> LoadOutcome {
        if self.failed.contains(&track.id) {
            tracing::debug!(track_id = %track.id, "refusing load of failed track");
            return LoadOutcome::Suppressed;
        }

        timers.cancel(TimerSlot::LoadRetry);
        self.last_load = self.last_load.next();
        let load_id = self.last_load;

        self.active = Some(ActiveLoad {
            load_id,
            track: track.clone(),
            url: track.preview_url.clone().unwrap_or_default(),
            attempt: 0,
            autoplay,
        });
        self.position = 0.0;
        self.duration = if track.duration.is_finite() {
            track.duration.max(0.0)
        } else {
            0.0
        };
        self.pending_seek = None;

        if track.preview_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            self.output.detach();
            let err = PlaybackError::NoSource(track.id);
            self.fail_terminal(MediaError::new(MediaErrorKind::NotSupported, err.to_string()));
            return LoadOutcome::Failed;
        }

        tracing::debug!(track_id = %track.id, %load_id, autoplay, "loading track");
        self.set_state(PlaybackState::Loading);
        self.output.set_position(0.0);
        self.attempt_load(timers);
        LoadOutcome::Started(load_id)
    }

    /// Resume at `seconds` once the current load has metadata
    pub fn seek_when_ready(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.pending_seek = Some(seconds);
            self.position = seconds;
        }
    }

    fn attempt_load(&mut self, timers: &mut TimerQueue) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let (load_id, url, autoplay) = (active.load_id, active.url.clone(), active.autoplay);

        match self.output.load(load_id, &url) {
            Ok(()) => {
                if autoplay {
                    self.start_output();
                }
            }
            Err(err) => self.handle_load_error(err, timers),
        }
    }

    fn handle_load_error(&mut self, err: MediaError, timers: &mut TimerQueue) {
        if err.is_abort() {
            tracing::debug!(error = %err, "load aborted");
            self.settle_paused();
            return;
        }
        if err.is_terminal() {
            self.fail_terminal(err);
            return;
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.attempt >= self.config.max_load_retries {
            self.fail_terminal(err);
            return;
        }

        let delay = self.config.retry_delay(active.attempt);
        active.attempt += 1;
        tracing::warn!(
            track_id = %active.track.id,
            load_id = %active.load_id,
            attempt = active.attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "load failed, retrying"
        );
        self.set_state(PlaybackState::Loading);
        timers.schedule(TimerSlot::LoadRetry, delay);
    }

    /// Retry timer fired for the live load
    pub fn on_retry_due(&mut self, timers: &mut TimerQueue) {
        match &self.active {
            Some(active) if !self.failed.contains(&active.track.id) => {
                tracing::debug!(load_id = %active.load_id, attempt = active.attempt, "retrying load");
                self.attempt_load(timers);
            }
            _ => {}
        }
    }

    fn fail_terminal(&mut self, err: MediaError) {
        let Some(active) = self.active.as_ref() else {
            return;
        };
        let track_id = active.track.id;
        let kind = FailureKind::classify(&err);

        self.failed.insert(track_id);
        tracing::error!(
            %track_id,
            load_id = %active.load_id,
            attempts = active.attempt,
            ?kind,
            error = %err,
            "track failed"
        );
        self.set_state(PlaybackState::Error);
        self.pending_events.push(PlayerEvent::PlaybackFailed {
            track_id,
            kind,
            message: err.message,
        });
    }

    /// Apply an event that passed load fencing
    pub fn handle_event(&mut self, event: MediaEvent, timers: &mut TimerQueue) -> Option<EngineSignal> {
        match event {
            MediaEvent::LoadStarted => {
                tracing::trace!(load_id = ?self.current_load(), "load started");
            }
            MediaEvent::MetadataLoaded { duration } => {
                if duration.is_finite() && duration > 0.0 {
                    self.duration = duration;
                    self.pending_events
                        .push(PlayerEvent::DurationChanged { duration });
                }
                if let Some(target) = self.pending_seek.take() {
                    let target = target.clamp(0.0, self.duration);
                    self.output.set_position(target);
                    self.set_position(target);
                }
            }
            MediaEvent::CanPlay => {
                tracing::trace!(load_id = ?self.current_load(), "source ready");
            }
            MediaEvent::TimeUpdate { position } => {
                if position.is_finite() {
                    self.set_position(position);
                }
            }
            MediaEvent::Playing => self.set_state(PlaybackState::Playing),
            MediaEvent::Paused => {
                if self.state == PlaybackState::Playing {
                    self.set_state(PlaybackState::Paused);
                }
            }
            MediaEvent::Ended => {
                self.set_position(self.duration);
                return Some(EngineSignal::TrackEnded);
            }
            MediaEvent::RateChange => return Some(EngineSignal::RateChanged),
            MediaEvent::Error(err) => {
                if err.is_abort() {
                    tracing::debug!(error = %err, "media operation aborted");
                } else if matches!(self.state, PlaybackState::Loading | PlaybackState::Playing) {
                    if self.state == PlaybackState::Playing {
                        self.pending_seek = Some(self.position);
                    }
                    self.handle_load_error(err, timers);
                } else {
                    tracing::warn!(error = %err, state = ?self.state, "media error outside playback");
                }
            }
        }
        None
    }

    fn start_output(&mut self) {
        match self.output.play() {
            Ok(()) => self.set_state(PlaybackState::Playing),
            Err(err) if err.is_abort() => {
                tracing::debug!(error = %err, "play superseded");
            }
            Err(err) => {
                tracing::warn!(error = %err, "autoplay failed");
                self.settle_paused();
            }
        }
    }

    /// Leave a loading or playing state for `Paused`, dropping autoplay
    fn settle_paused(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.autoplay = false;
        }
        if matches!(self.state, PlaybackState::Loading | PlaybackState::Playing) {
            self.set_state(PlaybackState::Paused);
        }
    }

    /// Start or resume playback of the loaded track
    ///
    /// A track that already ended restarts from zero. Superseded plays count
    /// as success.
    pub fn play(&mut self) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Err(PlaybackError::NoTrackLoaded);
        };
        if self.state == PlaybackState::Error {
            return Err(PlaybackError::InvalidOperation(format!(
                "track {} failed to load",
                active.track.id
            )));
        }
        active.autoplay = true;

        if self.state == PlaybackState::Idle {
            self.output.set_position(0.0);
            self.set_position(0.0);
        }

        match self.output.play() {
            Ok(()) => {
                self.set_state(PlaybackState::Playing);
                Ok(())
            }
            Err(err) if err.is_abort() => {
                tracing::debug!(error = %err, "play superseded");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "play failed");
                self.settle_paused();
                Err(err.into())
            }
        }
    }

    pub fn pause(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.autoplay = false;
        }
        self.output.pause();
        if matches!(self.state, PlaybackState::Playing | PlaybackState::Loading) {
            self.set_state(PlaybackState::Paused);
        }
    }

    pub fn toggle_play(&mut self) -> Result<()> {
        if self.is_playing() {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Move the playhead; callers clamp
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        if self.active.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        if !seconds.is_finite() {
            return Err(PlaybackError::InvalidOperation(format!(
                "cannot seek to {seconds}"
            )));
        }
        self.output.set_position(seconds);
        self.set_position(seconds);
        Ok(())
    }

    /// Seek relative to the current position, clamped to `[0, duration]`
    pub fn skip_by(&mut self, delta: f64) -> Result<()> {
        let target = (self.position + delta).clamp(0.0, self.duration.max(0.0));
        self.seek(target)
    }

    /// Repeat-one: restart the loaded track in place
    ///
    /// Failures are logged only; they never count toward the failed set.
    pub fn replay(&mut self) {
        self.output.set_position(0.0);
        self.set_position(0.0);
        match self.output.play() {
            Ok(()) => self.set_state(PlaybackState::Playing),
            Err(err) if err.is_abort() => {}
            Err(err) => {
                tracing::warn!(error = %err, "repeat-one replay failed");
                self.set_state(PlaybackState::Paused);
            }
        }
    }

    /// Natural end with nothing to advance to
    pub fn finish(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.autoplay = false;
        }
        self.set_state(PlaybackState::Idle);
    }

    /// Set volume; returns the clamped level
    pub fn set_volume(&mut self, level: f32) -> f32 {
        let applied = self.volume.set_level(level);
        self.output.set_volume(applied);
        self.emit_volume();
        applied
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.volume.set_muted(muted);
        self.output.set_muted(muted);
        self.emit_volume();
    }

    pub fn toggle_mute(&mut self) -> bool {
        let muted = !self.volume.is_muted();
        self.set_muted(muted);
        muted
    }

    /// Re-assert volume and mute on the output
    pub fn reassert_volume(&mut self) {
        self.output.set_volume(self.volume.level());
        self.output.set_muted(self.volume.is_muted());
    }

    /// Force rate, default rate and pitch preservation onto the output
    pub fn apply_rate(&mut self, rate: f64) {
        self.output.set_playback_rate(rate);
        self.output.set_default_playback_rate(rate);
        self.output.set_preserves_pitch(true);
    }

    /// Stop driving the output (session teardown)
    pub fn shutdown(&mut self) {
        self.output.detach();
        if let Some(active) = self.active.as_mut() {
            active.autoplay = false;
        }
        if self.state == PlaybackState::Playing || self.state == PlaybackState::Loading {
            self.set_state(PlaybackState::Paused);
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            self.state = state;
            self.pending_events.push(PlayerEvent::StateChanged { state });
        }
    }

    fn set_position(&mut self, position: f64) {
        self.position = position;
        self.pending_events
            .push(PlayerEvent::PositionChanged { position });
    }

    fn emit_volume(&mut self) {
        self.pending_events.push(PlayerEvent::VolumeChanged {
            volume: self.volume.level(),
            is_muted: self.volume.is_muted(),
        });
    }
}
