//! Core types for playback management

use cadence_core::{QueueEntry, Track};
use serde::{Deserialize, Serialize};

/// Transport state of the playback engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing loaded, or the last track ended without auto-advance
    Idle,

    /// Source assigned, waiting for the output to become playable
    Loading,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// The current track failed terminally
    Error,
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the queue runs out
    #[default]
    #[serde(rename = "none", alias = "off")]
    Off,

    /// Loop through history once the queue runs out
    All,

    /// Loop the current track only
    One,
}

impl RepeatMode {
    /// Next mode in the UI toggle cycle (none -> all -> one -> none)
    #[must_use]
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }
}

/// Monotonic id assigned to every load attempt
///
/// Only effects tagged with the newest id may mutate engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(pub u64);

impl LoadId {
    /// The id that follows this one
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for LoadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Point-in-time copy of the whole player state
///
/// Handed to the UI layer and to the persistence bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub current_track: Option<Track>,
    pub queue: Vec<QueueEntry>,
    pub history: Vec<Track>,
    pub state: PlaybackState,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub is_muted: bool,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
    pub playback_rate: f64,
    pub is_loading: bool,
    pub is_auto_queueing: bool,
}

impl PlayerSnapshot {
    /// Whether audio is currently playing
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}
