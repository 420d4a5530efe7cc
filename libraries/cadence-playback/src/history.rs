//! Playback history tracking
//!
//! Bounded stack of previously played tracks backing "previous" and the
//! repeat-all wrap.

use cadence_core::Track;
use std::collections::VecDeque;

/// Playback history with bounded size
///
/// Most recent track at the back. When full, the oldest entry is discarded.
#[derive(Debug, Clone)]
pub struct History {
    tracks: VecDeque<Track>,
    max_size: usize,
}

impl History {
    /// Create new history with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            tracks: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    /// Add track to history
    pub fn push(&mut self, track: Track) {
        if self.tracks.len() >= self.max_size {
            self.tracks.pop_front();
        }
        self.tracks.push_back(track);
    }

    /// Append several tracks, oldest first
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) {
        for track in tracks {
            self.push(track);
        }
    }

    /// Most recent track, without removing it
    pub fn peek(&self) -> Option<&Track> {
        self.tracks.back()
    }

    /// Pop most recent track
    pub fn pop(&mut self) -> Option<Track> {
        self.tracks.pop_back()
    }

    /// Remove every track, oldest first
    pub fn take_all(&mut self) -> Vec<Track> {
        self.tracks.drain(..).collect()
    }

    /// Tracks oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn to_vec(&self) -> Vec<Track> {
        self.tracks.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(500)
    }
}
