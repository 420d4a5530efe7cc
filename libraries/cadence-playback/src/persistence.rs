//! Persistence bridge
//!
//! Mirrors session state to a [`KeyValueStore`] under three keys:
//! `<prefix>.queue_state`, `<prefix>.volume` and `<prefix>.playback_rate`.
//!
//! Writes are debounced through [`TimerSlot::PersistDebounce`]: every change
//! re-arms the timer, and only its firing writes. Playhead movement only arms
//! an idle timer, so position is saved at most once per debounce window.
//!
//! The queue payload is versioned. Version 1 was a flat
//! `{queue, history, currentTrack, currentTime, isShuffled, repeatMode}`
//! object with bare tracks in `queue`. Version 2 wraps queued tracks in
//! tagged entries and records auto-queue state. A version 1 payload is
//! migrated on load and the migrated form is written back immediately;
//! anything unrecognized is dropped.

use crate::auto_queue::SmartQueueState;
use crate::config::PlaybackConfig;
use crate::timer::{TimerQueue, TimerSlot};
use crate::types::RepeatMode;
use cadence_core::{KeyValueStore, QueueEntry, QueueSource, Track};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Current queue payload version
pub const QUEUE_STATE_VERSION: u32 = 2;

/// Version 2 queue payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueueState {
    pub version: u32,
    pub queued_tracks: Vec<QueueEntry>,
    #[serde(default)]
    pub smart_queue_state: SmartQueueState,
    #[serde(default)]
    pub history: Vec<Track>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_track: Option<Track>,
    #[serde(default)]
    pub current_time: f64,
    #[serde(default)]
    pub is_shuffled: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
}

/// Version 1 payload, read only for migration
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyQueueState {
    queue: Vec<Track>,
    #[serde(default)]
    history: Vec<Track>,
    #[serde(default)]
    current_track: Option<Track>,
    #[serde(default)]
    current_time: f64,
    #[serde(default)]
    is_shuffled: bool,
    #[serde(default)]
    repeat_mode: RepeatMode,
}

impl From<LegacyQueueState> for PersistedQueueState {
    fn from(legacy: LegacyQueueState) -> Self {
        Self {
            version: QUEUE_STATE_VERSION,
            queued_tracks: legacy
                .queue
                .into_iter()
                .map(|track| QueueEntry::new(track, QueueSource::User))
                .collect(),
            smart_queue_state: SmartQueueState::default(),
            history: legacy.history,
            current_track: legacy.current_track,
            current_time: legacy.current_time,
            is_shuffled: legacy.is_shuffled,
            repeat_mode: legacy.repeat_mode,
        }
    }
}

/// Shape of a stored queue payload
enum StoredShape {
    Current(PersistedQueueState),
    Legacy(LegacyQueueState),
    Unknown(String),
}

fn classify(value: Value) -> StoredShape {
    match value.get("version") {
        Some(version) if version.as_u64() == Some(u64::from(QUEUE_STATE_VERSION)) => {
            match serde_json::from_value(value) {
                Ok(state) => StoredShape::Current(state),
                Err(err) => StoredShape::Unknown(format!("malformed version 2 payload: {err}")),
            }
        }
        Some(version) => StoredShape::Unknown(format!("unsupported version {version}")),
        None if value.get("queue").is_some_and(Value::is_array) => {
            match serde_json::from_value(value) {
                Ok(state) => StoredShape::Legacy(state),
                Err(err) => StoredShape::Unknown(format!("malformed version 1 payload: {err}")),
            }
        }
        None => StoredShape::Unknown("no version and no queue array".to_string()),
    }
}

/// Debounced state mirror
pub struct PersistenceBridge {
    store: Arc<dyn KeyValueStore>,
    queue_key: String,
    volume_key: String,
    rate_key: String,
    debounce: Duration,
    dirty: bool,
}

impl PersistenceBridge {
    pub fn new(config: &PlaybackConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            queue_key: config.storage_key("queue_state"),
            volume_key: config.storage_key("volume"),
            rate_key: config.storage_key("playback_rate"),
            debounce: config.persist_debounce(),
            dirty: false,
        }
    }

    /// Read the stored queue state, migrating and cleaning up as needed
    ///
    /// Storage errors and unrecognized payloads yield `None`.
    pub fn load_queue_state(&self) -> Option<PersistedQueueState> {
        let value = match self.store.get(&self.queue_key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %self.queue_key, error = %err, "failed to read queue state");
                return None;
            }
        };

        match classify(value) {
            StoredShape::Current(state) => Some(state),
            StoredShape::Legacy(legacy) => {
                let migrated = PersistedQueueState::from(legacy);
                tracing::info!(
                    key = %self.queue_key,
                    queued = migrated.queued_tracks.len(),
                    "migrated queue state to version 2"
                );
                self.write_queue_state(&migrated);
                Some(migrated)
            }
            StoredShape::Unknown(reason) => {
                tracing::warn!(key = %self.queue_key, %reason, "discarding stored queue state");
                if let Err(err) = self.store.remove(&self.queue_key) {
                    tracing::warn!(key = %self.queue_key, error = %err, "failed to remove queue state");
                }
                None
            }
        }
    }

    /// Stored volume, if any and in range
    pub fn load_volume(&self) -> Option<f32> {
        self.read_number(&self.volume_key)
            .filter(|v| (0.0..=1.0).contains(v))
            .map(|v| v as f32)
    }

    /// Stored playback rate, if any
    pub fn load_playback_rate(&self) -> Option<f64> {
        self.read_number(&self.rate_key)
    }

    fn read_number(&self, key: &str) -> Option<f64> {
        match self.store.get(key) {
            Ok(value) => value.and_then(|v| v.as_f64()),
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read stored value");
                None
            }
        }
    }

    /// Note a change; the write happens when the debounce timer fires
    pub fn schedule(&mut self, timers: &mut TimerQueue) {
        self.dirty = true;
        timers.schedule(TimerSlot::PersistDebounce, self.debounce);
    }

    /// Note a change that happens continuously, such as the playhead
    ///
    /// Arms the debounce timer only when none is pending, so a steady
    /// stream of these still writes once per debounce window.
    pub fn touch(&mut self, timers: &mut TimerQueue) {
        self.dirty = true;
        if !timers.is_pending(TimerSlot::PersistDebounce) {
            timers.schedule(TimerSlot::PersistDebounce, self.debounce);
        }
    }

    /// Whether a change is waiting to be written
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write everything out now
    pub fn flush(&mut self, state: &PersistedQueueState, volume: f32, playback_rate: f64) {
        self.dirty = false;
        self.write_queue_state(state);
        self.write_value(&self.volume_key, Value::from(f64::from(volume)));
        self.write_value(&self.rate_key, Value::from(playback_rate));
    }

    fn write_queue_state(&self, state: &PersistedQueueState) {
        match serde_json::to_value(state) {
            Ok(value) => self.write_value(&self.queue_key, value),
            Err(err) => tracing::warn!(error = %err, "failed to serialize queue state"),
        }
    }

    fn write_value(&self, key: &str, value: Value) {
        if let Err(err) = self.store.set(key, value) {
            tracing::warn!(key, error = %err, "failed to persist state");
        }
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("queue_key", &self.queue_key)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
