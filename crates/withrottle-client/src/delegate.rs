//! Delegate interface for confirmed state changes.

use withrottle_protocol::{Direction, SpeedStepMode, TrackPower};

/// External sink the engine notifies when the server confirms a state
/// change.
///
/// Every method has a no-op default, so an implementation only overrides the
/// callbacks it cares about. When no delegate is attached at all,
/// notifications are silently suppressed; the engine still applies the
/// corresponding state transitions.
///
/// Callbacks run inside `poll`. A delegate must not re-enter the engine from
/// a callback; re-entrant polling is unsupported.
pub trait ThrottleDelegate {
    /// Protocol version announced by the server (`VN`).
    fn received_version(&mut self, version: &str) {
        let _ = version;
    }

    /// Fast clock time changed, either from a `PFT` update or a local tick.
    fn fast_time_changed(&mut self, time: u32) {
        let _ = time;
    }

    /// Fast clock rate changed (`PFT` with a rate field).
    fn fast_time_rate_changed(&mut self, rate: f64) {
        let _ = rate;
    }

    /// Server requires a heartbeat every `seconds` (`*<seconds>`, positive).
    fn heartbeat_config(&mut self, seconds: u32) {
        let _ = seconds;
    }

    /// Decoder function state reported by the server (`F` action).
    fn received_function_state(&mut self, function: u8, state: bool) {
        let _ = (function, state);
    }

    /// Throttle speed reported by the server (`V` action).
    fn received_speed(&mut self, speed: i32) {
        let _ = speed;
    }

    /// Travel direction reported by the server (`R` action).
    fn received_direction(&mut self, direction: Direction) {
        let _ = direction;
    }

    /// Speed step mode reported by the server (`s` action).
    fn received_speed_steps(&mut self, steps: SpeedStepMode) {
        let _ = steps;
    }

    /// Web server port announced by the server (`PW`).
    fn received_web_port(&mut self, port: i32) {
        let _ = port;
    }

    /// Track power state reported by the server (`PPA`).
    fn received_track_power(&mut self, state: TrackPower) {
        let _ = state;
    }

    /// An address was added to this throttle (`MT+`).
    fn address_added(&mut self, address: &str, entry: &str) {
        let _ = (address, entry);
    }

    /// An address was released from this throttle (`MT-`).
    fn address_removed(&mut self, address: &str, command: &str) {
        let _ = (address, command);
    }

    /// Another throttle holds the address; selection needs a steal (`MTS`).
    fn address_steal_needed(&mut self, address: &str, entry: &str) {
        let _ = (address, entry);
    }
}
