/// Tagged queue entries
use crate::types::{Track, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a queue entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueSource {
    /// Added explicitly by the user
    User,
    /// Merged in by the auto-queue controller
    Smart,
    /// Queued from a playlist
    Playlist,
    /// Queued from an album
    Album,
    /// Queued from an artist page
    Artist,
    /// Queued from a radio station
    Radio,
    /// Queued from a recommendation shelf
    Recommendation,
}

/// A track sitting in the queue
///
/// `queue_id` is the entry's identity: it survives reorders, so the same
/// track can be queued twice and still be addressed unambiguously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Unique, stable entry id
    pub queue_id: String,

    /// The queued track
    pub track: Track,

    /// Provenance tag
    pub queue_source: QueueSource,

    /// Insertion time (ISO-8601 on the wire)
    pub added_at: DateTime<Utc>,

    /// Track the recommendation was seeded from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_track_id: Option<TrackId>,

    /// Similarity score reported by the recommender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,

    /// Human-readable reason the entry was added
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl QueueEntry {
    /// Wrap a track in a fresh entry inserted now
    pub fn new(track: Track, queue_source: QueueSource) -> Self {
        Self {
            queue_id: Uuid::new_v4().to_string(),
            track,
            queue_source,
            added_at: Utc::now(),
            seed_track_id: None,
            similarity_score: None,
            reasoning: None,
        }
    }

    /// Entry merged in by the auto-queue controller
    pub fn recommended(track: Track, seed_track_id: TrackId, reasoning: impl Into<String>) -> Self {
        Self {
            seed_track_id: Some(seed_track_id),
            reasoning: Some(reasoning.into()),
            ..Self::new(track, QueueSource::Smart)
        }
    }

    /// Builder: attach a similarity score
    #[must_use]
    pub fn with_similarity(mut self, score: f64) -> Self {
        self.similarity_score = Some(score);
        self
    }
}
