//! Smart auto-queue
//!
//! Keeps the queue from running dry by pulling recommendations seeded from
//! the current track. One cycle looks like this:
//!
//! 1. [`AutoQueueController::evaluate`] sees the queue at or below the
//!    threshold, takes the single-flight guard and hands back a
//!    [`RecommendationRequest`].
//! 2. The session runs the fetch off the playback path.
//! 3. [`AutoQueueController::complete`] filters the results and appends up
//!    to `max(min_top_up, fill_floor - queue_len)` tagged entries.
//! 4. The guard stays held for a cool-down after completion so a queue
//!    hovering around the threshold does not refetch in a loop.
//!
//! Fetch failures end the cycle quietly; auto-queue is best-effort.

use crate::config::PlaybackConfig;
use crate::queue::QueueManager;
use crate::timer::{TimerQueue, TimerSlot};
use cadence_core::{
    validate_track, CoreError, QueueEntry, RecommendationRequest, SmartQueueSettings, Track,
    TrackId, TrackValidation,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Persisted summary of auto-queue activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartQueueState {
    /// Whether auto-queue has contributed to the current queue
    pub is_active: bool,
    /// When recommendations were last merged
    #[serde(default)]
    pub last_refresh_at: Option<DateTime<Utc>>,
    /// Total tracks merged this session
    #[serde(default)]
    pub tracks_added: usize,
    /// Seed of the most recent cycle
    #[serde(default)]
    pub seed_track_id: Option<TrackId>,
}

#[derive(Debug, Clone)]
struct Seed {
    id: TrackId,
    label: String,
}

/// Decides when to fetch recommendations and merges the results
#[derive(Debug)]
pub struct AutoQueueController {
    settings: Option<SmartQueueSettings>,
    min_request: usize,
    fill_floor: usize,
    min_top_up: usize,
    cooldown: Duration,

    /// Single-flight guard; held from trigger until the cool-down elapses
    guard: bool,
    /// Fetch outstanding
    fetching: Option<Seed>,
    state: SmartQueueState,
}

impl AutoQueueController {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            settings: None,
            min_request: config.auto_queue_min_request,
            fill_floor: config.auto_queue_fill_floor,
            min_top_up: config.auto_queue_min_top_up,
            cooldown: config.auto_queue_cooldown(),
            guard: false,
            fetching: None,
            state: SmartQueueState::default(),
        }
    }

    /// Replace the user's settings; `None` turns the feature off
    pub fn set_settings(&mut self, settings: Option<SmartQueueSettings>) {
        self.settings = settings;
    }

    pub fn settings(&self) -> Option<&SmartQueueSettings> {
        self.settings.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.as_ref().is_some_and(|s| s.auto_queue_enabled)
    }

    /// Fetch outstanding
    pub fn is_auto_queueing(&self) -> bool {
        self.fetching.is_some()
    }

    /// Guard held (fetch outstanding or cooling down)
    pub fn is_guarded(&self) -> bool {
        self.guard
    }

    pub fn state(&self) -> &SmartQueueState {
        &self.state
    }

    pub fn restore_state(&mut self, state: SmartQueueState) {
        self.state = state;
    }

    /// Whether a queue of `queue_len` entries should trigger a fetch
    pub fn should_trigger(&self, queue_len: usize) -> bool {
        match &self.settings {
            Some(settings) => {
                settings.auto_queue_enabled
                    && queue_len <= settings.auto_queue_threshold
                    && !self.guard
            }
            None => false,
        }
    }

    /// Number of tracks to merge into a queue of `queue_len` entries
    pub fn top_up_count(&self, queue_len: usize) -> usize {
        self.min_top_up
            .max(self.fill_floor.saturating_sub(queue_len))
    }

    /// Number of tracks to ask the recommender for
    ///
    /// Over-fetches so dedup and filtering losses still leave enough.
    pub fn request_count(&self, queue_len: usize) -> usize {
        let configured = self.settings.as_ref().map_or(0, |s| s.auto_queue_count);
        self.min_request
            .max(configured)
            .max(self.top_up_count(queue_len) * 2)
    }

    /// Start a cycle if the queue needs one
    ///
    /// Takes the guard and returns the request to send. Returns `None` when
    /// the trigger condition does not hold or there is no current track to
    /// seed from.
    pub fn evaluate(&mut self, queue: &QueueManager) -> Option<RecommendationRequest> {
        if !self.should_trigger(queue.len()) {
            return None;
        }
        let seed = queue.current()?;

        let track_names = match seed.text_key() {
            Some(key) => vec![key],
            None => vec![seed.id.to_string()],
        };
        let request = RecommendationRequest {
            track_names,
            exclude_track_ids: vec![seed.id],
            count: self.request_count(queue.len()),
        };

        match validate_track(seed) {
            TrackValidation::Valid(track) => tracing::info!(
                seed_track_id = %track.id,
                seed = %track.title,
                artist = %track.artist.name,
                queue_len = queue.len(),
                count = request.count,
                "auto-queue triggered"
            ),
            TrackValidation::Invalid(issues) => tracing::info!(
                seed_track_id = %seed.id,
                ?issues,
                queue_len = queue.len(),
                count = request.count,
                "auto-queue triggered from incomplete seed"
            ),
        }

        self.guard = true;
        self.fetching = Some(Seed {
            id: seed.id,
            label: seed.text_key().unwrap_or_else(|| seed.title.clone()),
        });
        Some(request)
    }

    /// End a cycle that could not be started (no service, no runtime)
    pub fn abandon(&mut self, timers: &mut TimerQueue) {
        self.fetching = None;
        timers.schedule(TimerSlot::AutoQueueCooldown, self.cooldown);
    }

    /// Merge the outcome of a fetch into `queue`
    ///
    /// Returns how many entries were appended. Whatever the outcome of an
    /// outstanding cycle, the guard release is scheduled; a result with no
    /// cycle outstanding is dropped and arms nothing.
    pub fn complete(
        &mut self,
        result: Result<Vec<Track>, CoreError>,
        queue: &mut QueueManager,
        timers: &mut TimerQueue,
    ) -> usize {
        let Some(seed) = self.fetching.take() else {
            tracing::debug!("ignoring recommendations with no cycle outstanding");
            return 0;
        };
        timers.schedule(TimerSlot::AutoQueueCooldown, self.cooldown);

        let fetched = match result {
            Ok(tracks) => tracks,
            Err(err) => {
                tracing::warn!(seed_track_id = %seed.id, error = %err, "recommendation fetch failed");
                return 0;
            }
        };

        let exclude_explicit = self.settings.as_ref().is_some_and(|s| s.exclude_explicit);
        let want = self.top_up_count(queue.len());
        let mut seen: HashSet<TrackId> = queue.known_ids();
        let fetched_count = fetched.len();

        let entries: Vec<QueueEntry> = fetched
            .into_iter()
            .filter(|t| t.readable && !(exclude_explicit && t.explicit))
            .filter(|t| validate_track(t).is_valid())
            .filter(|t| seen.insert(t.id))
            .take(want)
            .map(|t| QueueEntry::recommended(t, seed.id, format!("Similar to {}", seed.label)))
            .collect();

        let added = queue.append_entries(entries);
        if added > 0 {
            self.state.is_active = true;
            self.state.last_refresh_at = Some(Utc::now());
            self.state.tracks_added += added;
            self.state.seed_track_id = Some(seed.id);
        }
        tracing::info!(
            seed_track_id = %seed.id,
            fetched = fetched_count,
            wanted = want,
            added,
            "auto-queue merged recommendations"
        );
        added
    }

    /// Cool-down elapsed; allow the next trigger
    pub fn release_guard(&mut self) {
        if self.fetching.is_none() {
            self.guard = false;
        }
    }

    /// Drop any outstanding cycle (session teardown)
    pub fn reset(&mut self) {
        self.guard = false;
        self.fetching = None;
    }
}
