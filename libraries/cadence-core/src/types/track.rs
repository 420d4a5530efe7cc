/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Artist reference embedded in a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    /// Catalog artist id
    pub id: i64,

    /// Display name
    pub name: String,
}

impl ArtistRef {
    /// Create a new artist reference
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Album reference embedded in a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRef {
    /// Catalog album id
    pub id: i64,

    /// Album title
    pub title: String,

    /// Small cover art URL
    #[serde(default)]
    pub cover_small: Option<String>,

    /// Medium cover art URL
    #[serde(default)]
    pub cover_medium: Option<String>,

    /// Large cover art URL
    #[serde(default)]
    pub cover_large: Option<String>,
}

impl AlbumRef {
    /// Create a new album reference without cover art
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            cover_small: None,
            cover_medium: None,
            cover_large: None,
        }
    }
}

/// Playable catalog track
///
/// Tracks are value types: two tracks are equal when their ids are equal,
/// regardless of any other metadata the catalog attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Catalog track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Duration in seconds
    pub duration: f64,

    /// Performing artist
    pub artist: ArtistRef,

    /// Album the track belongs to
    pub album: AlbumRef,

    /// Preview/stream URL handed to the media output
    #[serde(default)]
    pub preview_url: Option<String>,

    /// Explicit-content flag
    #[serde(default)]
    pub explicit: bool,

    /// Whether the catalog allows playback of this track
    #[serde(default = "default_readable")]
    pub readable: bool,
}

fn default_readable() -> bool {
    true
}

impl Track {
    /// Create a new readable, non-explicit track
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: ArtistRef,
        album: AlbumRef,
        duration: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration,
            artist,
            album,
            preview_url: None,
            explicit: false,
            readable: true,
        }
    }

    /// Builder: attach a playable source URL
    #[must_use]
    pub fn with_preview_url(mut self, url: impl Into<String>) -> Self {
        self.preview_url = Some(url.into());
        self
    }

    /// Builder: mark as explicit content
    #[must_use]
    pub fn with_explicit(mut self, explicit: bool) -> Self {
        self.explicit = explicit;
        self
    }

    /// Text key used to seed recommendation lookups ("artist title")
    pub fn text_key(&self) -> Option<String> {
        let artist = self.artist.name.trim();
        let title = self.title.trim();
        if artist.is_empty() || title.is_empty() {
            return None;
        }
        Some(format!("{} {}", artist, title))
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Reason a track failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// Catalog ids are strictly positive
    NonPositiveId,
    /// Title is empty or whitespace
    MissingTitle,
    /// Artist name is empty or whitespace
    MissingArtist,
    /// Duration is negative, NaN or infinite
    InvalidDuration,
}

/// Outcome of [`validate_track`]
#[derive(Debug, Clone)]
pub enum TrackValidation {
    /// The track is complete enough to record or log
    Valid(Track),
    /// The track is missing required fields
    Invalid(Vec<ValidationIssue>),
}

impl TrackValidation {
    /// Whether validation succeeded
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Check that a track carries everything downstream collaborators need
///
/// Run before history recording and before a track is used as a
/// recommendation seed.
pub fn validate_track(track: &Track) -> TrackValidation {
    let mut issues = Vec::new();

    if track.id.get() <= 0 {
        issues.push(ValidationIssue::NonPositiveId);
    }
    if track.title.trim().is_empty() {
        issues.push(ValidationIssue::MissingTitle);
    }
    if track.artist.name.trim().is_empty() {
        issues.push(ValidationIssue::MissingArtist);
    }
    if !track.duration.is_finite() || track.duration < 0.0 {
        issues.push(ValidationIssue::InvalidDuration);
    }

    if issues.is_empty() {
        TrackValidation::Valid(track.clone())
    } else {
        TrackValidation::Invalid(issues)
    }
}
