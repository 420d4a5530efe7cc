/// Smart queue preferences and recommendation requests
use crate::types::TrackId;
use serde::{Deserialize, Serialize};

/// How adventurous recommendations should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityPreference {
    /// Stay close to the seed track
    Strict,
    /// Mix of close matches and discoveries
    #[default]
    Balanced,
    /// Favor variety over similarity
    Diverse,
}

/// Per-user auto-queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartQueueSettings {
    /// Master switch for auto-queue
    pub auto_queue_enabled: bool,

    /// Queue length at or below which more tracks are fetched
    pub auto_queue_threshold: usize,

    /// Desired fill count (scales the recommendation request size)
    pub auto_queue_count: usize,

    /// Similarity preference passed through to the recommender
    #[serde(default)]
    pub similarity_preference: SimilarityPreference,

    /// Drop explicit tracks from recommendations
    #[serde(default)]
    pub exclude_explicit: bool,
}

impl Default for SmartQueueSettings {
    fn default() -> Self {
        Self {
            auto_queue_enabled: false,
            auto_queue_threshold: 3,
            auto_queue_count: 10,
            similarity_preference: SimilarityPreference::Balanced,
            exclude_explicit: false,
        }
    }
}

/// Request handed to the recommendation collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    /// Seed keys ("artist title", or the raw id when no text key exists)
    pub track_names: Vec<String>,

    /// Tracks the recommender must not return
    pub exclude_track_ids: Vec<TrackId>,

    /// Number of tracks requested
    pub count: usize,
}
