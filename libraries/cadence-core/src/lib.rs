//! Cadence Core
//!
//! Domain types and collaborator contracts shared by the Cadence playback
//! engine and the UI layer that hosts it.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `QueueEntry`, `SmartQueueSettings`
//! - **Collaborator Traits**: `RecommendationService`, `PreferencesService`,
//!   `PlayRecorder`, `KeyValueStore`
//! - **Error Handling**: Unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use cadence_core::types::{validate_track, AlbumRef, ArtistRef, QueueEntry, QueueSource, Track, TrackId};
//!
//! let track = Track::new(
//!     TrackId::new(42),
//!     "Windowlicker",
//!     ArtistRef::new(7, "Aphex Twin"),
//!     AlbumRef::new(3, "Windowlicker"),
//!     366.0,
//! )
//! .with_preview_url("https://cdn.example.com/42.mp3");
//!
//! assert!(validate_track(&track).is_valid());
//!
//! let entry = QueueEntry::new(track, QueueSource::User);
//! assert_eq!(entry.queue_source, QueueSource::User);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod storage;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use storage::{KeyValueStore, MemoryStore};
pub use traits::{PlayRecorder, PreferencesService, RecommendationService};

pub use types::{
    validate_track, AlbumRef, ArtistRef, QueueEntry, QueueSource, RecommendationRequest,
    SimilarityPreference, SmartQueueSettings, Track, TrackId, TrackValidation, ValidationIssue,
};
