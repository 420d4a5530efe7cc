//! Artist-diversity shuffle
//!
//! Picks tracks one at a time from a randomized pool, preferring a track
//! whose artist differs from the previous pick. When every remaining track
//! shares the last artist, any of them is taken.

use cadence_core::QueueEntry;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Shuffle entries with the thread-local RNG
pub fn shuffle_entries(entries: Vec<QueueEntry>) -> Vec<QueueEntry> {
    shuffle_entries_with(entries, &mut thread_rng())
}

/// Shuffle entries with a caller-supplied RNG
pub fn shuffle_entries_with<R: Rng + ?Sized>(
    mut entries: Vec<QueueEntry>,
    rng: &mut R,
) -> Vec<QueueEntry> {
    if entries.len() <= 2 {
        entries.shuffle(rng);
        return entries;
    }

    let mut pool = entries;
    pool.shuffle(rng);

    let mut result: Vec<QueueEntry> = Vec::with_capacity(pool.len());
    while !pool.is_empty() {
        let last_artist = result.last().map(|e| e.track.artist.id);
        let pick = pool
            .iter()
            .position(|e| Some(e.track.artist.id) != last_artist)
            .unwrap_or(0);
        result.push(pool.remove(pick));
    }
    result
}
