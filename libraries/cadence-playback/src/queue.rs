//! Queue manager
//!
//! Owns the current track, the ordered queue of upcoming entries and the
//! play history:
//!
//! ```text
//! History (oldest .. newest)  |  Current  |  Queue (next .. last)
//!   h1  h2  h3                |     c     |   q1  q2  q3
//! ```
//!
//! Forward movement pushes the old current onto history; "previous" pops
//! history and puts the old current back at the head of the queue. The
//! current track is never also in the queue.

use crate::error::{PlaybackError, Result};
use crate::history::History;
use crate::shuffle;
use cadence_core::{QueueEntry, QueueSource, Track, TrackId};
use rand::Rng;
use std::collections::HashSet;

/// Result of an [`QueueManager::add_to_queue`] call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOutcome {
    /// Number of entries appended
    pub added: usize,
    /// Tracks skipped because they were already current or queued
    pub rejected: Vec<Track>,
}

/// Queue + history + current track
#[derive(Debug, Clone)]
pub struct QueueManager {
    current: Option<Track>,
    entries: Vec<QueueEntry>,
    history: History,

    /// Queue ids in pre-shuffle order, present while shuffled
    unshuffled_order: Option<Vec<String>>,
}

impl QueueManager {
    /// Create an empty queue whose history keeps at most `history_size` tracks
    pub fn new(history_size: usize) -> Self {
        Self {
            current: None,
            entries: Vec::new(),
            history: History::new(history_size),
            unshuffled_order: None,
        }
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.unshuffled_order.is_some()
    }

    fn is_current(&self, id: TrackId) -> bool {
        self.current.as_ref().is_some_and(|t| t.id == id)
    }

    /// Whether `id` is the current track or already queued
    pub fn contains(&self, id: TrackId) -> bool {
        self.current.as_ref().is_some_and(|t| t.id == id)
            || self.entries.iter().any(|e| e.track.id == id)
    }

    /// Ids of every track the session knows about: current, queued, played
    pub fn known_ids(&self) -> HashSet<TrackId> {
        self.current
            .iter()
            .chain(self.entries.iter().map(|e| &e.track))
            .chain(self.history.iter())
            .map(|t| t.id)
            .collect()
    }

    /// Make `track` current, pushing the previous current onto history
    ///
    /// Any queued entry for the same track is dropped so the track is never
    /// both current and queued. Returns the id of the replaced track.
    pub fn set_current(&mut self, track: Track) -> Option<TrackId> {
        self.entries.retain(|e| e.track.id != track.id);
        let previous = self.current.replace(track);
        let previous_id = previous.as_ref().map(|t| t.id);
        if let Some(previous) = previous {
            self.history.push(previous);
        }
        previous_id
    }

    /// Append user tracks
    ///
    /// With `check_duplicates`, tracks that are already current or queued
    /// (including earlier tracks of the same batch) are skipped and returned
    /// in [`AddOutcome::rejected`]. The current track is always rejected.
    pub fn add_to_queue(&mut self, tracks: Vec<Track>, check_duplicates: bool) -> AddOutcome {
        let mut outcome = AddOutcome::default();
        for track in tracks {
            if self.is_current(track.id) || (check_duplicates && self.contains(track.id)) {
                outcome.rejected.push(track);
                continue;
            }
            self.entries.push(QueueEntry::new(track, QueueSource::User));
            outcome.added += 1;
        }
        outcome
    }

    /// Append pre-built entries without any duplicate check
    pub fn append_entries(&mut self, entries: Vec<QueueEntry>) -> usize {
        let added = entries.len();
        self.entries.extend(entries);
        added
    }

    /// Put tracks at the front of the queue, keeping their relative order
    ///
    /// The current track is skipped.
    pub fn add_to_play_next(&mut self, tracks: Vec<Track>) -> usize {
        let front: Vec<QueueEntry> = tracks
            .into_iter()
            .filter(|t| !self.is_current(t.id))
            .map(|t| QueueEntry::new(t, QueueSource::User))
            .collect();
        let added = front.len();
        self.entries.splice(0..0, front);
        added
    }

    /// Remove the entry at `index`
    pub fn remove(&mut self, index: usize) -> Result<QueueEntry> {
        if index >= self.entries.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        Ok(self.entries.remove(index))
    }

    /// Drop every queued entry; current track and history are untouched
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(order) = self.unshuffled_order.as_mut() {
            order.clear();
        }
    }

    /// Move the entry at `from` to `to`, keeping its identity
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.entries.len();
        if from >= len {
            return Err(PlaybackError::IndexOutOfBounds(from));
        }
        if to >= len {
            return Err(PlaybackError::IndexOutOfBounds(to));
        }
        if from != to {
            let entry = self.entries.remove(from);
            self.entries.insert(to, entry);
        }
        Ok(())
    }

    /// Jump to the entry at `index`
    ///
    /// The current track and every entry before `index` move to history in
    /// that order; the target becomes current and is returned for loading.
    pub fn play_from_queue(&mut self, index: usize) -> Result<Track> {
        if index >= self.entries.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        let mut skipped: Vec<QueueEntry> = self.entries.drain(..=index).collect();
        let target = skipped
            .pop()
            .ok_or(PlaybackError::IndexOutOfBounds(index))?
            .track;

        if let Some(current) = self.current.take() {
            self.history.push(current);
        }
        self.history.extend(skipped.into_iter().map(|e| e.track));
        self.set_current(target.clone());
        Ok(target)
    }

    /// Dequeue the head and make it current
    pub fn play_next(&mut self) -> Option<Track> {
        if self.entries.is_empty() {
            return None;
        }
        let next = self.entries.remove(0).track;
        self.set_current(next.clone());
        Some(next)
    }

    /// Step back into history
    ///
    /// The current track is requeued at the front; the popped history track
    /// becomes current without being pushed onto history again. As with
    /// [`set_current`](Self::set_current), queued entries for the track that
    /// becomes current are dropped; nothing else in the queue moves.
    pub fn play_previous(&mut self) -> Option<Track> {
        let previous = self.history.pop()?;
        if let Some(current) = self.current.take() {
            self.entries
                .insert(0, QueueEntry::new(current, QueueSource::User));
        }
        self.entries.retain(|e| e.track.id != previous.id);
        self.current = Some(previous.clone());
        Some(previous)
    }

    /// Repeat-all: move the whole history into the queue
    ///
    /// History is cleared. A history entry for the current track is left out
    /// of the new queue. Returns the new queue length.
    pub fn wrap_history(&mut self) -> usize {
        let current_id = self.current.as_ref().map(|t| t.id);
        let wrapped = self
            .history
            .take_all()
            .into_iter()
            .filter(|t| Some(t.id) != current_id)
            .map(|t| QueueEntry::new(t, QueueSource::User));
        self.entries.extend(wrapped);
        self.entries.len()
    }

    /// Turn shuffle on or off
    pub fn set_shuffle(&mut self, enabled: bool) {
        self.set_shuffle_with(enabled, &mut rand::thread_rng());
    }

    /// Turn shuffle on or off with a caller-supplied RNG
    pub fn set_shuffle_with<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) {
        match (enabled, self.unshuffled_order.is_some()) {
            (true, false) => {
                self.unshuffled_order =
                    Some(self.entries.iter().map(|e| e.queue_id.clone()).collect());
                let entries = std::mem::take(&mut self.entries);
                self.entries = shuffle::shuffle_entries_with(entries, rng);
            }
            (false, true) => self.restore_unshuffled_order(),
            _ => {}
        }
    }

    /// Flip shuffle; returns the new state
    pub fn toggle_shuffle(&mut self) -> bool {
        let enabled = !self.is_shuffled();
        self.set_shuffle(enabled);
        enabled
    }

    /// Put entries back in their pre-shuffle order
    ///
    /// Entries removed while shuffled stay removed; entries added while
    /// shuffled follow the restored ones in their current order.
    fn restore_unshuffled_order(&mut self) {
        let Some(order) = self.unshuffled_order.take() else {
            return;
        };
        let mut remaining = std::mem::take(&mut self.entries);
        let mut restored = Vec::with_capacity(remaining.len());
        for queue_id in &order {
            if let Some(pos) = remaining.iter().position(|e| &e.queue_id == queue_id) {
                restored.push(remaining.remove(pos));
            }
        }
        restored.extend(remaining);
        self.entries = restored;
    }

    /// Replace the whole state (boot-time restore)
    pub fn restore(
        &mut self,
        current: Option<Track>,
        entries: Vec<QueueEntry>,
        history: Vec<Track>,
        shuffled: bool,
    ) {
        let current_id = current.as_ref().map(|t| t.id);
        self.current = current;
        self.entries = entries
            .into_iter()
            .filter(|e| Some(e.track.id) != current_id)
            .collect();
        self.history.clear();
        self.history.extend(history);
        // The pre-shuffle order is not persisted; the restored order is the
        // best approximation of it.
        self.unshuffled_order = shuffled
            .then(|| self.entries.iter().map(|e| e.queue_id.clone()).collect());
    }
}
