//! Heartbeat scheduling.
//!
//! Some servers drop a session that stays silent longer than the announced
//! heartbeat period. The throttle answers with a bare `*` before the period
//! expires; the send threshold is 0.8 of the period as a guard margin
//! against the server-side timeout.

use std::time::{Duration, Instant};

const GUARD_FACTOR: f64 = 0.8;

/// Tracks the heartbeat period and when the next acknowledgment is owed.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    /// Period in seconds announced by the server. 0 = disabled.
    period_secs: i32,
    /// When the last heartbeat was sent (or the schedule anchor, established
    /// on the first poll after connect).
    last_sent: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        HeartbeatMonitor {
            period_secs: 0,
            last_sent: None,
        }
    }

    /// Reset to the initial state (disabled, no anchor).
    pub fn reset(&mut self) {
        *self = HeartbeatMonitor::new();
    }

    /// Set the period from a `*<seconds>` update. Does not restart the send
    /// schedule; only an actual transmission does that.
    pub fn set_period(&mut self, seconds: i32) {
        self.period_secs = seconds;
    }

    /// Announced period in seconds.
    pub fn period_secs(&self) -> i32 {
        self.period_secs
    }

    /// Whether a heartbeat is owed at `now`.
    ///
    /// Never true while the period is unset or non-positive.
    pub fn due(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_sent else {
            self.last_sent = Some(now);
            return false;
        };

        if self.period_secs <= 0 {
            return false;
        }

        let threshold = Duration::from_secs_f64(self.period_secs as f64 * GUARD_FACTOR);
        now.duration_since(last) >= threshold
    }

    /// Record that a heartbeat went out at `now`.
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new()
    }
}
