//! Scaled fast clock.
//!
//! Model railroads run a simulation clock faster than wall time. The server
//! broadcasts an absolute time plus a rate (simulated seconds per real
//! second); between broadcasts the throttle advances the clock locally, once
//! per real second.

use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Fast clock state and its once-per-second ticker.
#[derive(Debug)]
pub struct FastClock {
    /// Current fast time, in seconds since the epoch the server uses.
    time_secs: f64,
    /// Simulated seconds added per real second. 0 = stopped.
    rate: f64,
    /// Wall-clock anchor of the last tick. Established on the first poll
    /// after connect.
    last_tick: Option<Instant>,
}

impl FastClock {
    pub fn new() -> Self {
        FastClock {
            time_secs: 0.0,
            rate: 0.0,
            last_tick: None,
        }
    }

    /// Reset to the initial state (time 0, rate 0, no tick anchor).
    pub fn reset(&mut self) {
        *self = FastClock::new();
    }

    /// Set the absolute fast time (from a `PFT` update).
    pub fn set_time(&mut self, secs: f64) {
        self.time_secs = secs;
    }

    /// Set the rate (from a `PFT` update with a rate field).
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    /// Advance the local clock if a real second has elapsed.
    ///
    /// Fires at most once per poll. A fired tick with rate 0 still restarts
    /// the interval but reports no change; a stopped clock is not "changing"
    /// every second.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return false;
        };

        if now.duration_since(last) < TICK_INTERVAL {
            return false;
        }

        self.last_tick = Some(now);
        if self.rate == 0.0 {
            false
        } else {
            self.time_secs += self.rate;
            true
        }
    }

    /// Current fast time in seconds.
    pub fn time_secs(&self) -> f64 {
        self.time_secs
    }

    /// Current rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Hour-of-day of the current fast time.
    pub fn hours(&self) -> u32 {
        (self.time_secs as u64 / 3600 % 24) as u32
    }

    /// Minute-of-hour of the current fast time.
    pub fn minutes(&self) -> u32 {
        (self.time_secs as u64 / 60 % 60) as u32
    }
}

impl Default for FastClock {
    fn default() -> Self {
        Self::new()
    }
}
