/// Collaborator contracts consumed by the playback engine
///
/// Every remote service the engine talks to is reached through one of these
/// traits, so hosts plug in their RPC client and tests plug in fakes.
use crate::error::Result;
use crate::types::{RecommendationRequest, SmartQueueSettings, Track};
use async_trait::async_trait;

/// Source of recommended tracks for auto-queue
///
/// May return fewer tracks than requested. Both an empty result and an
/// error are treated as "no recommendations this cycle".
#[async_trait]
pub trait RecommendationService: Send + Sync {
    /// Fetch tracks similar to the seeds in `request`
    async fn fetch_recommendations(&self, request: RecommendationRequest) -> Result<Vec<Track>>;
}

/// Read access to the user's smart-queue preferences
#[async_trait]
pub trait PreferencesService: Send + Sync {
    /// Current smart-queue settings
    ///
    /// `None` means the user never configured smart queue; the engine treats
    /// it as the feature being off.
    async fn smart_queue_settings(&self) -> Result<Option<SmartQueueSettings>>;
}

/// Listening-history recorder
///
/// Invoked fire-and-forget on every track change. Failures are logged by the
/// caller and never block playback.
#[async_trait]
pub trait PlayRecorder: Send + Sync {
    /// Record that `track` started playing
    async fn record_play(&self, track: &Track, duration_secs: f64) -> Result<()>;
}
