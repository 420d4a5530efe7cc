//! Error types for playback management

use cadence_core::{CoreError, TrackId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Track has no playable source URL
    #[error("Track {0} has no playable source")]
    NoSource(TrackId),

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Media output error
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error from the key/value collaborator
    #[error(transparent)]
    Storage(#[from] CoreError),

    /// Serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Classified reason a media operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaErrorKind {
    /// Superseded by a newer load or a pause during load (expected)
    Aborted,
    /// Network failure fetching the source
    Network,
    /// Source fetched but could not be decoded
    Decode,
    /// Source format not supported by the runtime
    NotSupported,
    /// Upstream catalog service unreachable
    ServiceUnavailable,
    /// Anything else
    Other,
}

/// Error reported by the media output
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct MediaError {
    /// Classification
    pub kind: MediaErrorKind,
    /// Runtime-provided detail
    pub message: String,
}

impl MediaError {
    /// Create a new media error
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Load superseded by a newer one
    pub fn aborted() -> Self {
        Self::new(MediaErrorKind::Aborted, "operation superseded by a newer load")
    }

    /// Expected race from rapid track switching
    pub fn is_abort(&self) -> bool {
        self.kind == MediaErrorKind::Aborted
    }

    /// Failure that should not be retried
    pub fn is_terminal(&self) -> bool {
        self.kind == MediaErrorKind::ServiceUnavailable
    }
}

/// How a terminal per-track failure should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Catalog service unreachable; worth trying again shortly
    ServiceUnavailable,
    /// Anything else
    Generic,
}

impl FailureKind {
    /// Classify the error that ended a load
    pub fn classify(error: &MediaError) -> Self {
        if error.kind == MediaErrorKind::ServiceUnavailable {
            Self::ServiceUnavailable
        } else {
            Self::Generic
        }
    }

    /// Message suitable for a playback-failed notification
    pub fn user_message(self) -> &'static str {
        match self {
            Self::ServiceUnavailable => {
                "The music service is temporarily unavailable. Please try again shortly."
            }
            Self::Generic => "Playback failed. Try another track.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_is_not_terminal() {
        let err = MediaError::aborted();
        assert!(err.is_abort());
        assert!(!err.is_terminal());
    }

    #[test]
    fn failure_classification_drives_messaging() {
        let unavailable = MediaError::new(MediaErrorKind::ServiceUnavailable, "503");
        let network = MediaError::new(MediaErrorKind::Network, "reset");

        assert_eq!(FailureKind::classify(&unavailable), FailureKind::ServiceUnavailable);
        assert_eq!(FailureKind::classify(&network), FailureKind::Generic);
        assert_ne!(
            FailureKind::ServiceUnavailable.user_message(),
            FailureKind::Generic.user_message()
        );
    }
}
