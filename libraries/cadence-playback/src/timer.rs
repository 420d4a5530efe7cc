//! Schedulable timers
//!
//! Every delayed or periodic action in a session goes through one
//! [`TimerQueue`]: load retries, the auto-queue cool-down, the persistence
//! debounce and the drift check. Each logical operation owns exactly one
//! [`TimerSlot`], and scheduling a slot that is already armed replaces the
//! pending timer, so two timers can never fire for the same operation.
//!
//! The queue keeps its own monotonic clock that only moves when the host
//! calls [`TimerQueue::advance`]. Hosts forward wall-clock time; tests step
//! it deterministically.

use std::collections::HashMap;
use std::time::Duration;

/// Logical owner of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerSlot {
    /// Backoff before the next load attempt
    LoadRetry,
    /// Release of the auto-queue single-flight guard
    AutoQueueCooldown,
    /// Debounced state write
    PersistDebounce,
    /// Periodic playback-rate drift check
    DriftCheck,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    deadline: Duration,
    period: Option<Duration>,
    seq: u64,
}

/// Single-slot-per-operation timer queue
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    timers: HashMap<TimerSlot, Timer>,
    seq: u64,
}

impl TimerQueue {
    /// Create an empty queue at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session-relative time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arm a one-shot timer, replacing any pending timer in `slot`
    pub fn schedule(&mut self, slot: TimerSlot, delay: Duration) {
        self.arm(slot, delay, None);
    }

    /// Arm a repeating timer, replacing any pending timer in `slot`
    pub fn schedule_interval(&mut self, slot: TimerSlot, period: Duration) {
        self.arm(slot, period, Some(period));
    }

    fn arm(&mut self, slot: TimerSlot, delay: Duration, period: Option<Duration>) {
        self.seq += 1;
        let replaced = self.timers.insert(
            slot,
            Timer {
                deadline: self.now + delay,
                period,
                seq: self.seq,
            },
        );
        if replaced.is_some() {
            tracing::trace!(?slot, "rescheduled pending timer");
        }
    }

    /// Cancel the timer in `slot`; returns whether one was pending
    pub fn cancel(&mut self, slot: TimerSlot) -> bool {
        self.timers.remove(&slot).is_some()
    }

    /// Cancel every pending timer
    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    /// Whether `slot` has a pending timer
    pub fn is_pending(&self, slot: TimerSlot) -> bool {
        self.timers.contains_key(&slot)
    }

    /// Time remaining until `slot` fires
    pub fn remaining(&self, slot: TimerSlot) -> Option<Duration> {
        self.timers
            .get(&slot)
            .map(|t| t.deadline.saturating_sub(self.now))
    }

    /// Number of pending timers
    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Move the clock forward and collect every timer that came due
    ///
    /// Fired slots are returned in deadline order. Interval timers fire at
    /// most once per call and are re-armed one period after the new time.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerSlot> {
        self.now += elapsed;

        let mut due: Vec<(Duration, u64, TimerSlot)> = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= self.now)
            .map(|(slot, t)| (t.deadline, t.seq, *slot))
            .collect();
        due.sort();

        for (_, _, slot) in &due {
            let Some(timer) = self.timers.remove(slot) else {
                continue;
            };
            if let Some(period) = timer.period {
                self.seq += 1;
                self.timers.insert(
                    *slot,
                    Timer {
                        deadline: self.now + period,
                        period: Some(period),
                        seq: self.seq,
                    },
                );
            }
        }

        due.into_iter().map(|(_, _, slot)| slot).collect()
    }
}
