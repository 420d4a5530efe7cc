//! Volume and mute state
//!
//! The media runtime takes a linear 0.0-1.0 level. Mute is kept separate
//! from the level so unmuting restores whatever the user had before.

/// Volume controller
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    /// Linear level (0.0-1.0)
    level: f32,

    /// Mute state (preserves level)
    muted: bool,
}

impl Volume {
    /// Create new volume controller; out-of-range levels are clamped
    pub fn new(level: f32) -> Self {
        Self {
            level: Self::clamp(level),
            muted: false,
        }
    }

    /// Set volume level; returns the value actually applied
    pub fn set_level(&mut self, level: f32) -> f32 {
        self.level = Self::clamp(level);
        self.level
    }

    /// Current level (0.0-1.0), regardless of mute
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Toggle mute; returns the new mute state
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Level the listener actually hears
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level
        }
    }

    fn clamp(level: f32) -> f32 {
        if level.is_nan() {
            0.0
        } else {
            level.clamp(0.0, 1.0)
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(1.0)
    }
}
