//! Media output adapter
//!
//! Abstracts the single native audio handle a session plays through.
//!
//! Hosts implement [`MediaBackend`] around whatever the runtime offers (an
//! HTML audio element behind a bridge, a native player, a test fake). The
//! engine never talks to the backend directly; it goes through
//! [`MediaOutput`], which:
//! - stamps every load with its [`LoadId`] and remembers the live one
//! - drops backend events that belong to a superseded load
//! - makes setters idempotent, so re-asserting a value is free
//!
//! The equalizer taps the same handle through [`MediaOutput::handle`]; it
//! never changes transport state.

use crate::error::MediaError;
use crate::types::LoadId;
use serde::{Deserialize, Serialize};

/// Stable identity of the native output handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputHandle(pub u64);

/// Source assignment sent to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Attempt this request belongs to; the backend echoes it on events
    pub load_id: LoadId,
    /// Preview/stream URL
    pub url: String,
}

/// Low-level notifications from the output
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The runtime started fetching the source
    LoadStarted,
    /// Duration is known
    MetadataLoaded {
        /// Duration in seconds
        duration: f64,
    },
    /// Enough data buffered to start playback
    CanPlay,
    /// Playback position advanced
    TimeUpdate {
        /// Position in seconds
        position: f64,
    },
    /// Playback started or resumed
    Playing,
    /// Playback stopped without finishing
    Paused,
    /// Track finished naturally
    Ended,
    /// Effective or default playback rate changed
    RateChange,
    /// Load or playback failed
    Error(MediaError),
}

/// Event as delivered by the backend, tagged with the load it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    pub load_id: LoadId,
    pub event: MediaEvent,
}

impl BackendEvent {
    pub fn new(load_id: LoadId, event: MediaEvent) -> Self {
        Self { load_id, event }
    }
}

/// Platform audio output
///
/// Implementors wrap exactly one native handle. `load` and `play` may
/// complete asynchronously; later outcomes arrive as [`BackendEvent`]s
/// tagged with the request's load id.
pub trait MediaBackend: Send {
    /// Stable identity of the native handle
    fn handle(&self) -> OutputHandle;

    /// Assign a new source, abandoning any load still in flight
    fn load(&mut self, request: &LoadRequest) -> Result<(), MediaError>;

    /// Start or resume playback
    fn play(&mut self) -> Result<(), MediaError>;

    /// Pause playback
    fn pause(&mut self);

    /// Current position in seconds
    fn position(&self) -> f64;

    /// Move the playhead
    fn set_position(&mut self, seconds: f64);

    /// Duration in seconds, once metadata is loaded
    fn duration(&self) -> Option<f64>;

    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);

    fn muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);

    /// Effective playback rate
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&mut self, rate: f64);

    /// Base rate the runtime resets to when a new source loads
    fn default_playback_rate(&self) -> f64;
    fn set_default_playback_rate(&mut self, rate: f64);

    fn preserves_pitch(&self) -> bool;
    fn set_preserves_pitch(&mut self, preserve: bool);
}

const RATE_EPSILON: f64 = 1e-6;
const VOLUME_EPSILON: f32 = 1e-4;

/// Adapter owning the session's one media backend
pub struct MediaOutput {
    backend: Box<dyn MediaBackend>,
    live_load: Option<LoadId>,
}

impl MediaOutput {
    /// Wrap a backend
    pub fn new(backend: Box<dyn MediaBackend>) -> Self {
        Self {
            backend,
            live_load: None,
        }
    }

    /// Handle the equalizer attaches to
    pub fn handle(&self) -> OutputHandle {
        self.backend.handle()
    }

    /// Load currently allowed to produce events
    pub fn live_load(&self) -> Option<LoadId> {
        self.live_load
    }

    /// Assign a source for `load_id`
    ///
    /// Any earlier load becomes stale immediately: its events are dropped by
    /// [`MediaOutput::accept`] from here on.
    pub fn load(&mut self, load_id: LoadId, url: &str) -> Result<(), MediaError> {
        if let Some(previous) = self.live_load.filter(|p| *p != load_id) {
            tracing::debug!(%previous, %load_id, "superseding in-flight load");
        }
        self.live_load = Some(load_id);
        self.backend.load(&LoadRequest {
            load_id,
            url: url.to_string(),
        })
    }

    /// Start playback; aborts keep their classification for the caller
    pub fn play(&mut self) -> Result<(), MediaError> {
        self.backend.play()
    }

    pub fn pause(&mut self) {
        self.backend.pause();
    }

    /// Forget the live load (teardown); all later events are stale
    pub fn detach(&mut self) {
        self.backend.pause();
        self.live_load = None;
    }

    /// Filter a backend event through load fencing
    ///
    /// Returns `None` for events from superseded loads.
    pub fn accept(&self, event: BackendEvent) -> Option<MediaEvent> {
        match self.live_load {
            Some(live) if live == event.load_id => Some(event.event),
            live => {
                tracing::debug!(
                    event_load = %event.load_id,
                    live_load = ?live,
                    event = ?event.event,
                    "dropping stale media event"
                );
                None
            }
        }
    }

    pub fn position(&self) -> f64 {
        self.backend.position()
    }

    pub fn set_position(&mut self, seconds: f64) {
        if (self.backend.position() - seconds).abs() > RATE_EPSILON {
            self.backend.set_position(seconds);
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.backend.duration().filter(|d| d.is_finite())
    }

    pub fn volume(&self) -> f32 {
        self.backend.volume()
    }

    pub fn set_volume(&mut self, volume: f32) {
        if (self.backend.volume() - volume).abs() > VOLUME_EPSILON {
            self.backend.set_volume(volume);
        }
    }

    pub fn muted(&self) -> bool {
        self.backend.muted()
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.backend.muted() != muted {
            self.backend.set_muted(muted);
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.backend.playback_rate()
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        if (self.backend.playback_rate() - rate).abs() > RATE_EPSILON {
            self.backend.set_playback_rate(rate);
        }
    }

    pub fn default_playback_rate(&self) -> f64 {
        self.backend.default_playback_rate()
    }

    pub fn set_default_playback_rate(&mut self, rate: f64) {
        if (self.backend.default_playback_rate() - rate).abs() > RATE_EPSILON {
            self.backend.set_default_playback_rate(rate);
        }
    }

    pub fn preserves_pitch(&self) -> bool {
        self.backend.preserves_pitch()
    }

    pub fn set_preserves_pitch(&mut self, preserve: bool) {
        if self.backend.preserves_pitch() != preserve {
            self.backend.set_preserves_pitch(preserve);
        }
    }

    /// Whether rate or pitch differ from the intended values
    pub fn has_rate_drift(&self, intended_rate: f64) -> bool {
        (self.playback_rate() - intended_rate).abs() > RATE_EPSILON
            || (self.default_playback_rate() - intended_rate).abs() > RATE_EPSILON
            || !self.preserves_pitch()
    }
}

impl std::fmt::Debug for MediaOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaOutput")
            .field("handle", &self.backend.handle())
            .field("live_load", &self.live_load)
            .finish()
    }
}
