//! Player events
//!
//! The session buffers these as it goes and the host drains them with
//! [`crate::Session::drain_events`] to keep its UI in sync.

use crate::error::FailureKind;
use crate::types::PlaybackState;
use cadence_core::TrackId;
use serde::{Deserialize, Serialize};

/// Events emitted by a playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerEvent {
    /// Transport state changed
    StateChanged {
        /// The new state
        state: PlaybackState,
    },

    /// A different track became current
    TrackChanged {
        /// The new current track
        track_id: TrackId,
        /// The track it replaced, if any
        previous: Option<TrackId>,
    },

    /// Playhead moved
    PositionChanged {
        /// Position in seconds
        position: f64,
    },

    /// Duration of the current track became known
    DurationChanged {
        /// Duration in seconds
        duration: f64,
    },

    /// Volume or mute changed
    VolumeChanged {
        /// Level in 0.0-1.0
        volume: f32,
        /// Whether output is muted
        is_muted: bool,
    },

    /// Queue structure changed (added, removed, reordered, shuffled)
    QueueChanged {
        /// New queue length
        length: usize,
    },

    /// A track was not added because it is already current or queued
    DuplicateRejected {
        track_id: TrackId,
        title: String,
    },

    /// A track failed terminally and will not be retried this session
    PlaybackFailed {
        track_id: TrackId,
        /// Drives which message the UI shows
        kind: FailureKind,
        /// Detail from the media runtime
        message: String,
    },

    /// The last track ended with nothing to advance to
    PlaybackEnded,

    /// Repeat-all moved history back into the queue
    QueueWrapped {
        /// Length of the rebuilt queue
        length: usize,
    },

    /// Auto-queue started fetching recommendations
    AutoQueueStarted,

    /// Auto-queue cycle completed
    AutoQueueFinished {
        /// Number of tracks merged into the queue
        added: usize,
    },

    /// Output rate or pitch drifted and was forced back
    DriftCorrected {
        /// Rate observed before correction
        rate: f64,
        /// Default rate observed before correction
        default_rate: f64,
        /// Pitch preservation observed before correction
        preserves_pitch: bool,
    },
}

impl PlayerEvent {
    /// Whether this event reflects state worth persisting
    pub fn is_persistent_change(&self) -> bool {
        matches!(
            self,
            Self::TrackChanged { .. }
                | Self::QueueChanged { .. }
                | Self::QueueWrapped { .. }
                | Self::VolumeChanged { .. }
                | Self::AutoQueueFinished { .. }
        )
    }
}
