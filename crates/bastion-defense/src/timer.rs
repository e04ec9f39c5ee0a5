//! Schedulable interval timer driven by the host's main loop.
//!
//! The timer owns its countdown and never calls back on its own; the
//! caller advances it and acts on the number of elapsed intervals.

use tracing::warn;

use bastion_core::constants::{MAX_CATCH_UP_INTERVALS, TIMER_EPSILON};

#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval_secs: f64,
    remaining_secs: f64,
    running: bool,
}

impl IntervalTimer {
    /// A stopped timer. `interval_secs` must be positive.
    pub fn new(interval_secs: f64) -> Self {
        debug_assert!(interval_secs > 0.0);
        Self {
            interval_secs,
            remaining_secs: interval_secs,
            running: false,
        }
    }

    /// Start counting a full interval from now.
    pub fn start(&mut self) {
        self.remaining_secs = self.interval_secs;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Restart the countdown without changing the running state.
    pub fn reset(&mut self) {
        self.remaining_secs = self.interval_secs;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval_secs
    }

    pub fn remaining_secs(&self) -> f64 {
        self.remaining_secs
    }

    /// Advance by `dt` seconds and return how many intervals elapsed.
    ///
    /// Each elapsed interval restarts the countdown, carrying any overshoot.
    /// At most `MAX_CATCH_UP_INTERVALS` are reported per call; the rest of a
    /// long stall is dropped. Non-finite `dt` is ignored.
    pub fn advance(&mut self, dt: f64) -> u32 {
        if !dt.is_finite() {
            warn!(dt, "non-finite frame time ignored");
            return 0;
        }
        if !self.running || dt <= 0.0 {
            return 0;
        }
        self.remaining_secs -= dt;
        if self.remaining_secs > TIMER_EPSILON {
            return 0;
        }

        let due = ((TIMER_EPSILON - self.remaining_secs) / self.interval_secs).floor() + 1.0;
        self.remaining_secs += due * self.interval_secs;
        if !(self.remaining_secs > TIMER_EPSILON && self.remaining_secs <= self.interval_secs) {
            // Precision lost on a huge overshoot.
            self.remaining_secs = self.interval_secs;
        }
        if due > f64::from(MAX_CATCH_UP_INTERVALS) {
            warn!(due, cap = MAX_CATCH_UP_INTERVALS, "timer fell behind; dropping intervals");
            return MAX_CATCH_UP_INTERVALS;
        }
        due as u32
    }
}
