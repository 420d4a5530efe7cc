mod ids;
mod queue_entry;
mod settings;
mod track;

pub use ids::TrackId;
pub use queue_entry::{QueueEntry, QueueSource};
pub use settings::{RecommendationRequest, SimilarityPreference, SmartQueueSettings};
pub use track::{validate_track, AlbumRef, ArtistRef, Track, TrackValidation, ValidationIssue};
