/// Playback engine configuration
use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for a playback session
///
/// Every field has a default, so a partial TOML file or a handful of
/// `CADENCE_*` environment variables is enough to override a single value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Maximum number of tracks kept in history
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// Volume used when nothing is persisted (0.0-1.0)
    #[serde(default = "default_volume")]
    pub initial_volume: f32,

    /// Load attempts after the first failure before a track is given up on
    #[serde(default = "default_max_load_retries")]
    pub max_load_retries: u32,

    /// Base delay for exponential load backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Hold-off after an auto-queue cycle before the next may start
    #[serde(default = "default_auto_queue_cooldown_ms")]
    pub auto_queue_cooldown_ms: u64,

    /// Lower bound on the recommendation request size
    #[serde(default = "default_auto_queue_min_request")]
    pub auto_queue_min_request: usize,

    /// Queue depth auto-queue tops up to
    #[serde(default = "default_auto_queue_fill_floor")]
    pub auto_queue_fill_floor: usize,

    /// Minimum number of tracks merged per auto-queue cycle
    #[serde(default = "default_auto_queue_min_top_up")]
    pub auto_queue_min_top_up: usize,

    /// Quiet period before a state change is written out
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,

    /// Period of the playback-rate drift check
    #[serde(default = "default_drift_check_interval_ms")]
    pub drift_check_interval_ms: u64,

    /// Prefix for every persisted key
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            initial_volume: default_volume(),
            max_load_retries: default_max_load_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            auto_queue_cooldown_ms: default_auto_queue_cooldown_ms(),
            auto_queue_min_request: default_auto_queue_min_request(),
            auto_queue_fill_floor: default_auto_queue_fill_floor(),
            auto_queue_min_top_up: default_auto_queue_min_top_up(),
            persist_debounce_ms: default_persist_debounce_ms(),
            drift_check_interval_ms: default_drift_check_interval_ms(),
            storage_prefix: default_storage_prefix(),
        }
    }
}

impl PlaybackConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// Environment variables are prefixed with `CADENCE_`, e.g.
    /// `CADENCE_MAX_LOAD_RETRIES=5`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CADENCE")
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retry_base_delay_ms == 0 {
            return Err(PlaybackError::Config(
                "retry_base_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.drift_check_interval_ms == 0 || self.persist_debounce_ms == 0 {
            return Err(PlaybackError::Config(
                "timer periods must be greater than zero".to_string(),
            ));
        }
        if self.auto_queue_fill_floor < self.auto_queue_min_top_up {
            return Err(PlaybackError::Config(format!(
                "auto_queue_fill_floor ({}) is below auto_queue_min_top_up ({})",
                self.auto_queue_fill_floor, self.auto_queue_min_top_up
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(PlaybackError::Config(format!(
                "initial_volume {} is outside 0.0-1.0",
                self.initial_volume
            )));
        }
        Ok(())
    }

    /// Backoff delay before retry number `attempt` (0-based)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1u64 << attempt.min(16)))
    }

    pub fn auto_queue_cooldown(&self) -> Duration {
        Duration::from_millis(self.auto_queue_cooldown_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    pub fn drift_check_interval(&self) -> Duration {
        Duration::from_millis(self.drift_check_interval_ms)
    }

    /// Fully-qualified storage key for a state slice
    pub fn storage_key(&self, slice: &str) -> String {
        format!("{}.{}", self.storage_prefix, slice)
    }
}

// Default values
fn default_history_size() -> usize {
    500
}

fn default_volume() -> f32 {
    1.0
}

fn default_max_load_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_auto_queue_cooldown_ms() -> u64 {
    5000
}

fn default_auto_queue_min_request() -> usize {
    10
}

fn default_auto_queue_fill_floor() -> usize {
    8
}

fn default_auto_queue_min_top_up() -> usize {
    5
}

fn default_persist_debounce_ms() -> u64 {
    1000
}

fn default_drift_check_interval_ms() -> u64 {
    1000
}

fn default_storage_prefix() -> String {
    "cadence".to_string()
}
