//! Session resilience
//!
//! Media runtimes reset playback parameters behind our back: backgrounded
//! tabs, OS resume and some rate-change quirks all leave the output at a
//! rate or pitch setting the user never asked for. This layer re-asserts the
//! intended values on a fixed interval and on every event that is known to
//! cause drift.

use crate::config::PlaybackConfig;
use crate::engine::PlaybackEngine;
use crate::error::{PlaybackError, Result};
use crate::events::PlayerEvent;
use crate::timer::{TimerQueue, TimerSlot};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Rates the user may pick
pub const PLAYBACK_RATE_RANGE: RangeInclusive<f64> = 0.25..=4.0;

/// What prompted a drift check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionTrigger {
    /// Periodic check
    Interval,
    /// Output reported a rate change
    RateChange,
    /// Page or app became visible
    Visible,
    /// OS resumed from sleep
    Resume,
    /// Page restored from the back/forward cache
    PageShow,
}

/// Keeps rate and pitch where the user left them
#[derive(Debug)]
pub struct ResilienceLayer {
    intended_rate: f64,
    interval: Duration,
}

impl ResilienceLayer {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            intended_rate: 1.0,
            interval: config.drift_check_interval(),
        }
    }

    /// Rate the output should be running at
    pub fn intended_rate(&self) -> f64 {
        self.intended_rate
    }

    /// Record an explicit user rate change
    pub fn set_intended_rate(&mut self, rate: f64) -> Result<f64> {
        if !PLAYBACK_RATE_RANGE.contains(&rate) {
            return Err(PlaybackError::InvalidOperation(format!(
                "playback rate {rate} outside {}-{}",
                PLAYBACK_RATE_RANGE.start(),
                PLAYBACK_RATE_RANGE.end()
            )));
        }
        self.intended_rate = rate;
        Ok(rate)
    }

    /// Arm the periodic drift check
    pub fn start(&self, timers: &mut TimerQueue) {
        timers.schedule_interval(TimerSlot::DriftCheck, self.interval);
    }

    pub fn stop(&self, timers: &mut TimerQueue) {
        timers.cancel(TimerSlot::DriftCheck);
    }

    /// Compare the output against the intended values and fix any drift
    ///
    /// Returns the event describing the correction, if one was needed.
    /// Visibility and resume triggers also re-assert volume and mute.
    pub fn check(
        &self,
        engine: &mut PlaybackEngine,
        trigger: CorrectionTrigger,
    ) -> Option<PlayerEvent> {
        if matches!(
            trigger,
            CorrectionTrigger::Visible | CorrectionTrigger::Resume | CorrectionTrigger::PageShow
        ) {
            engine.reassert_volume();
        }

        let output = engine.output();
        if !output.has_rate_drift(self.intended_rate) {
            return None;
        }

        let rate = output.playback_rate();
        let default_rate = output.default_playback_rate();
        let preserves_pitch = output.preserves_pitch();
        tracing::warn!(
            ?trigger,
            rate,
            default_rate,
            preserves_pitch,
            intended = self.intended_rate,
            "playback rate drift corrected"
        );

        engine.apply_rate(self.intended_rate);
        Some(PlayerEvent::DriftCorrected {
            rate,
            default_rate,
            preserves_pitch,
        })
    }
}
