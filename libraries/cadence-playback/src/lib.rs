//! Cadence - Playback and queue engine
//!
//! Client-side playback core for the Cadence streaming client.
//!
//! This crate provides:
//! - Playback engine over a single media output, with load fencing and
//!   retry-with-backoff for transient load failures
//! - Queue manager (queue, history, jump, artist-diversity shuffle)
//! - Smart auto-queue fed by a recommendation collaborator
//! - Resilience checks that undo playback-rate and pitch drift
//! - Debounced, versioned persistence of queue, volume and rate
//!
//! # Architecture
//!
//! `cadence-playback` does not talk to any media runtime or storage itself.
//! The host supplies:
//! - a [`MediaBackend`] around its native audio handle
//! - a [`cadence_core::KeyValueStore`] for persisted state
//! - optionally a [`cadence_core::RecommendationService`] and a
//!   [`cadence_core::PlayRecorder`]
//!
//! Everything runs on the host's thread. Timers are virtual: the host
//! forwards elapsed time with [`Session::advance`]. The only asynchronous work
//! (recommendation fetches, play recording) is spawned on the ambient tokio
//! runtime when there is one.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_core::{AlbumRef, ArtistRef, MemoryStore, Track, TrackId};
//! use cadence_playback::{
//!     LoadRequest, MediaBackend, MediaError, OutputHandle, PlaybackConfig, Session,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct HtmlAudio {
//!     // ... bridge to the platform audio element
//! }
//!
//! impl MediaBackend for HtmlAudio {
//!     fn handle(&self) -> OutputHandle { OutputHandle(1) }
//!     fn load(&mut self, _request: &LoadRequest) -> Result<(), MediaError> { Ok(()) }
//!     fn play(&mut self) -> Result<(), MediaError> { Ok(()) }
//!     fn pause(&mut self) {}
//!     fn position(&self) -> f64 { 0.0 }
//!     fn set_position(&mut self, _seconds: f64) {}
//!     fn duration(&self) -> Option<f64> { None }
//!     fn volume(&self) -> f32 { 1.0 }
//!     fn set_volume(&mut self, _volume: f32) {}
//!     fn muted(&self) -> bool { false }
//!     fn set_muted(&mut self, _muted: bool) {}
//!     fn playback_rate(&self) -> f64 { 1.0 }
//!     fn set_playback_rate(&mut self, _rate: f64) {}
//!     fn default_playback_rate(&self) -> f64 { 1.0 }
//!     fn set_default_playback_rate(&mut self, _rate: f64) {}
//!     fn preserves_pitch(&self) -> bool { true }
//!     fn set_preserves_pitch(&mut self, _preserve: bool) {}
//! }
//!
//! let mut session = Session::new(
//!     PlaybackConfig::default(),
//!     Box::new(HtmlAudio {}),
//!     Arc::new(MemoryStore::new()),
//! )?;
//!
//! let track = Track::new(TrackId::new(1), "Song", ArtistRef::new(1, "Band"), AlbumRef::new(1, "LP"), 200.0)
//!     .with_preview_url("https://cdn.example.com/1.mp3");
//! session.load_track(track);
//!
//! // From the host's event loop
//! session.advance(Duration::from_millis(250));
//! for event in session.drain_events() {
//!     println!("{event:?}");
//! }
//! # Ok::<(), cadence_playback::PlaybackError>(())
//! ```

pub mod auto_queue;
pub mod config;
mod engine;
mod error;
mod events;
mod history;
pub mod output;
pub mod persistence;
mod queue;
pub mod resilience;
mod session;
mod shuffle;
pub mod timer;
pub mod types;
mod volume;

// Public exports
pub use auto_queue::{AutoQueueController, SmartQueueState};
pub use config::PlaybackConfig;
pub use engine::{EngineSignal, LoadOutcome, PlaybackEngine};
pub use error::{FailureKind, MediaError, MediaErrorKind, PlaybackError, Result};
pub use events::PlayerEvent;
pub use history::History;
pub use output::{BackendEvent, LoadRequest, MediaBackend, MediaEvent, MediaOutput, OutputHandle};
pub use persistence::{PersistedQueueState, PersistenceBridge, QUEUE_STATE_VERSION};
pub use queue::{AddOutcome, QueueManager};
pub use resilience::{CorrectionTrigger, ResilienceLayer, PLAYBACK_RATE_RANGE};
pub use session::Session;
pub use shuffle::{shuffle_entries, shuffle_entries_with};
pub use timer::{TimerQueue, TimerSlot};
pub use types::{LoadId, PlaybackState, PlayerSnapshot, RepeatMode};
pub use volume::Volume;
