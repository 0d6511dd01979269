//! The WiThrottle protocol engine.
//!
//! A single `ThrottleClient` owns all session state for one logical
//! connection: the line codec, the fast clock, the heartbeat schedule, and
//! the locomotive selection. The host drives it with one non-blocking
//! [`ThrottleClient::poll`] call per cycle; everything the engine does
//! happens inside that call.
//!
//! Malformed input never stops the poll loop. Every parse branch clamps,
//! drops, or defaults; a misbehaving server or a noisy line is a diagnostic,
//! not an error.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use withrottle_protocol::{
    lenient_float, lenient_int, validate_address, Direction, ServerMessage, SpeedStepMode,
    ThrottleCommand, LineCodec, MAX_FUNCTION, MAX_SPEED, MIN_SPEED, PROPERTY_SEPARATOR,
};

use crate::delegate::ThrottleDelegate;
use crate::fastclock::FastClock;
use crate::heartbeat::HeartbeatMonitor;
use crate::transport::Transport;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration applied when a transport is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Device name announced to the server on connect (`N<name>`).
    pub device_name: Option<String>,
    /// Device identifier announced to the server on connect (`HU<id>`).
    pub device_id: Option<String>,
    /// Ask the server to require heartbeats on connect (`*+`).
    pub require_heartbeat: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        ThrottleConfig {
            device_name: None,
            device_id: None,
            require_heartbeat: false,
        }
    }
}

// ============================================================================
// Change Flags
// ============================================================================

/// Per-poll change indicators. Reset at the start of every poll, never
/// accumulated across polls.
#[derive(Debug, Default, Clone, Copy)]
struct ChangeFlags {
    clock: bool,
    heartbeat: bool,
    locomotive: bool,
}

impl ChangeFlags {
    fn reset(&mut self) {
        *self = ChangeFlags::default();
    }
}

// ============================================================================
// Throttle Client
// ============================================================================

/// Client-side WiThrottle protocol engine.
///
/// Single-threaded and cooperative: the host calls [`poll`](Self::poll) once
/// per cycle and the call returns promptly. Delegate callbacks run inside
/// the poll; re-entering the engine from a callback is unsupported.
pub struct ThrottleClient {
    transport: Option<Box<dyn Transport>>,
    delegate: Option<Box<dyn ThrottleDelegate>>,
    config: ThrottleConfig,

    codec: LineCodec,
    protocol_version: Option<String>,
    fast_clock: FastClock,
    heartbeat: HeartbeatMonitor,

    // Locomotive session. Speed and direction are meaningful only while an
    // address is selected.
    selected_address: Option<String>,
    speed: i32,
    direction: Direction,
    speed_steps: Option<SpeedStepMode>,

    flags: ChangeFlags,
}

impl ThrottleClient {
    /// Create a client with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ThrottleConfig::default())
    }

    /// Create a client with the given configuration.
    pub fn with_config(config: ThrottleConfig) -> Self {
        ThrottleClient {
            transport: None,
            delegate: None,
            config,
            codec: LineCodec::new(),
            protocol_version: None,
            fast_clock: FastClock::new(),
            heartbeat: HeartbeatMonitor::new(),
            selected_address: None,
            speed: 0,
            direction: Direction::Forward,
            speed_steps: None,
            flags: ChangeFlags::default(),
        }
    }

    /// Attach a delegate to receive state-change notifications.
    pub fn set_delegate(&mut self, delegate: Box<dyn ThrottleDelegate>) {
        self.delegate = Some(delegate);
    }

    /// Detach and return the current delegate, if any.
    pub fn take_delegate(&mut self) -> Option<Box<dyn ThrottleDelegate>> {
        self.delegate.take()
    }

    // ========================================================================
    // Connection Lifecycle
    // ========================================================================

    /// Attach an already-connected transport.
    ///
    /// All session state is reset to initial values first, then the
    /// configured device identification (and heartbeat requirement) is
    /// announced.
    pub fn connect(&mut self, transport: Box<dyn Transport>) {
        self.reset_session();
        self.transport = Some(transport);

        if let Some(name) = self.config.device_name.clone() {
            self.send(&ThrottleCommand::DeviceName { name });
        }
        if let Some(id) = self.config.device_id.clone() {
            self.send(&ThrottleCommand::DeviceId { id });
        }
        if self.config.require_heartbeat {
            self.send(&ThrottleCommand::RequireHeartbeat { required: true });
        }
    }

    /// Detach the transport and reset all session state.
    ///
    /// No partial state survives: a later [`connect`](Self::connect) starts
    /// from initial values.
    pub fn disconnect(&mut self) {
        self.transport = None;
        self.reset_session();
    }

    /// Whether a transport is currently attached.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    fn reset_session(&mut self) {
        self.codec.clear();
        self.protocol_version = None;
        self.fast_clock.reset();
        self.heartbeat.reset();
        self.selected_address = None;
        self.speed = 0;
        self.direction = Direction::Forward;
        self.speed_steps = None;
        self.flags.reset();
    }

    // ========================================================================
    // Device Identification
    // ========================================================================

    /// Set the device name and announce it immediately (`N<name>`).
    pub fn set_device_name(&mut self, name: &str) -> bool {
        self.config.device_name = Some(name.to_string());
        self.send(&ThrottleCommand::DeviceName {
            name: name.to_string(),
        })
    }

    /// Set the device identifier and announce it immediately (`HU<id>`).
    pub fn set_device_id(&mut self, id: &str) -> bool {
        self.config.device_id = Some(id.to_string());
        self.send(&ThrottleCommand::DeviceId { id: id.to_string() })
    }

    // ========================================================================
    // Polling
    // ========================================================================

    /// Advance the engine one cycle using the wall clock.
    ///
    /// Returns true when anything changed this cycle: a fast-clock advance,
    /// a heartbeat transmission, or a state transition driven by a received
    /// line.
    pub fn poll(&mut self) -> bool {
        self.poll_at(Instant::now())
    }

    /// Advance the engine one cycle at an explicit time.
    ///
    /// Behavior is identical to [`poll`](Self::poll); hosts with their own
    /// time source (and the tests) use this directly. `now` must not move
    /// backward between calls.
    pub fn poll_at(&mut self, now: Instant) -> bool {
        self.flags.reset();

        let Some(mut transport) = self.transport.take() else {
            return false;
        };
        let mut changed = false;

        // time-driven sub-state first, then drain the wire
        if self.fast_clock.tick(now) {
            self.flags.clock = true;
            let time = self.fast_clock.time_secs() as u32;
            self.notify(|d| d.fast_time_changed(time));
            changed = true;
        }

        if self.heartbeat.due(now) {
            let cmd = ThrottleCommand::HeartbeatAck;
            trace!("==> {}", cmd.to_command_string());
            transport.send(&cmd.encode());
            self.heartbeat.mark_sent(now);
            changed = true;
        }

        let mut buf = [0u8; 256];
        loop {
            let n = transport.recv(&mut buf);
            if n == 0 {
                break;
            }
            for &byte in &buf[..n] {
                match self.codec.push_byte(byte) {
                    Ok(Some(line)) => changed |= self.process_line(&line),
                    Ok(None) => {}
                    Err(err) => warn!("{err}"),
                }
            }
        }

        self.transport = Some(transport);
        changed
    }

    // ========================================================================
    // Inbound Processing
    // ========================================================================

    fn process_line(&mut self, line: &str) -> bool {
        trace!("<== {line}");

        match ServerMessage::parse(line) {
            ServerMessage::FastTime(payload) => self.process_fast_time(&payload),
            ServerMessage::TrackPower(state) => {
                self.notify(|d| d.received_track_power(state));
                true
            }
            ServerMessage::Heartbeat(payload) => self.process_heartbeat_period(&payload),
            ServerMessage::ProtocolVersion(version) => {
                self.notify(|d| d.received_version(&version));
                self.protocol_version = Some(version);
                true
            }
            ServerMessage::WebPort(payload) => {
                let port = lenient_int(&payload);
                self.notify(|d| d.received_web_port(port));
                true
            }
            ServerMessage::LocomotiveAction(payload) => self.process_locomotive_action(&payload),
            ServerMessage::AddressAdded { address, entry } => {
                self.notify(|d| d.address_added(&address, &entry));
                true
            }
            ServerMessage::AddressRemoved { address, command } => {
                self.notify(|d| d.address_removed(&address, &command));
                true
            }
            ServerMessage::AddressStealNeeded { address, entry } => {
                self.notify(|d| d.address_steal_needed(&address, &entry));
                true
            }
            ServerMessage::Ignored => {
                debug!("ignoring: {line}");
                false
            }
        }
    }

    fn process_fast_time(&mut self, payload: &str) -> bool {
        // A separator at index 0 means an empty time field; the original
        // protocol treats that the same as no separator at all.
        match payload.find(PROPERTY_SEPARATOR).filter(|&p| p > 0) {
            Some(p) => {
                let time = lenient_int(&payload[..p]) as f64;
                let rate = lenient_float(&payload[p + PROPERTY_SEPARATOR.len()..]);
                self.fast_clock.set_time(time);
                self.fast_clock.set_rate(rate);
                let secs = time as u32;
                self.notify(|d| d.fast_time_changed(secs));
                self.notify(|d| d.fast_time_rate_changed(rate));
            }
            None => {
                let time = lenient_int(payload) as f64;
                self.fast_clock.set_time(time);
                let secs = time as u32;
                self.notify(|d| d.fast_time_changed(secs));
            }
        }
        self.flags.clock = true;
        true
    }

    fn process_heartbeat_period(&mut self, payload: &str) -> bool {
        let period = lenient_int(payload);
        self.heartbeat.set_period(period);
        if period > 0 {
            self.flags.heartbeat = true;
            self.notify(|d| d.heartbeat_config(period as u32));
            true
        } else {
            // zero or unparseable: no usable heartbeat requirement
            false
        }
    }

    /// Apply a locomotive action. The payload arrives prefixed by either
    /// the selected address or the wildcard `*`; whichever matches is
    /// stripped (selected address checked first) and the rest dispatches on
    /// its first character.
    fn process_locomotive_action(&mut self, payload: &str) -> bool {
        let mut remainder = payload;
        let wildcard = format!("*{PROPERTY_SEPARATOR}");
        if let Some(address) = self.selected_address.as_deref() {
            let addr_prefix = format!("{address}{PROPERTY_SEPARATOR}");
            if let Some(rest) = remainder.strip_prefix(addr_prefix.as_str()) {
                remainder = rest;
            } else if let Some(rest) = remainder.strip_prefix(wildcard.as_str()) {
                remainder = rest;
            }
        } else if let Some(rest) = remainder.strip_prefix(wildcard.as_str()) {
            remainder = rest;
        }
        // neither prefix matched: best-effort parse of the remainder as-is

        if remainder.is_empty() {
            debug!("locomotive action with no payload");
            return false;
        }

        match remainder.as_bytes()[0] {
            b'F' => self.process_function_state(remainder),
            b'V' => self.process_speed(remainder),
            b's' => self.process_speed_steps(remainder),
            b'R' => self.process_direction(remainder),
            _ => debug!("unrecognized locomotive action: {remainder}"),
        }
        true
    }

    /// `F[0|1]<num>`: e.g. `F03` releases function 3, `F112` presses
    /// function 12.
    fn process_function_state(&mut self, data: &str) {
        if data.len() < 3 {
            return;
        }
        let state = data.as_bytes()[1] == b'1';
        let Some(num_str) = data.get(2..) else {
            return;
        };
        let number = lenient_int(num_str);
        // "F0…" is only function zero if the text is literally "0"; any
        // other text that parses to 0 is garbage and must not be reported
        // as function zero.
        if number == 0 && num_str != "0" {
            debug!("unparseable function number: {num_str}");
            return;
        }
        let function = number as u8;
        self.flags.locomotive = true;
        self.notify(|d| d.received_function_state(function, state));
    }

    /// `V<speed>`: out-of-range values are clamped to 0, not rejected.
    fn process_speed(&mut self, data: &str) {
        if data.len() < 2 {
            return;
        }
        let mut speed = lenient_int(&data[1..]);
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            speed = 0;
        }
        self.speed = speed;
        self.flags.locomotive = true;
        self.notify(|d| d.received_speed(speed));
    }

    /// `s<steps>`: anything outside the closed mode set is dropped.
    fn process_speed_steps(&mut self, data: &str) {
        if data.len() < 2 {
            return;
        }
        let value = lenient_int(&data[1..]);
        match SpeedStepMode::from_wire(value) {
            Some(steps) => {
                self.speed_steps = Some(steps);
                self.flags.locomotive = true;
                self.notify(|d| d.received_speed_steps(steps));
            }
            None => debug!("invalid speed step value: {value}"),
        }
    }

    /// `R[0|1]`: exactly two characters; anything but `0` is forward.
    fn process_direction(&mut self, data: &str) {
        if data.len() != 2 {
            return;
        }
        let direction = Direction::from_wire(data.as_bytes()[1] as char);
        self.direction = direction;
        self.flags.locomotive = true;
        self.notify(|d| d.received_direction(direction));
    }

    // ========================================================================
    // Locomotive Operations
    // ========================================================================

    /// Select a locomotive by address (`S<digits>` or `L<digits>`).
    ///
    /// The address doubles as the roster name in the selection command.
    pub fn add_locomotive(&mut self, address: &str) -> bool {
        if let Err(err) = validate_address(address) {
            debug!("{err}");
            return false;
        }
        if !self.send(&ThrottleCommand::SelectLocomotive {
            address: address.to_string(),
            roster_name: address.to_string(),
        }) {
            return false;
        }
        self.selected_address = Some(address.to_string());
        true
    }

    /// Steal a locomotive another throttle holds, then treat it as selected.
    pub fn steal_locomotive(&mut self, address: &str) -> bool {
        if let Err(err) = validate_address(address) {
            debug!("{err}");
            return false;
        }
        if !self.send(&ThrottleCommand::StealLocomotive {
            address: address.to_string(),
        }) {
            return false;
        }
        self.selected_address = Some(address.to_string());
        true
    }

    /// Release the current selection.
    pub fn release_locomotive(&mut self) -> bool {
        if !self.send(&ThrottleCommand::ReleaseLocomotive) {
            return false;
        }
        self.selected_address = None;
        true
    }

    /// Set the throttle speed. Rejects values outside [0, 126].
    pub fn set_speed(&mut self, speed: i32) -> bool {
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return false;
        }
        if !self.send(&ThrottleCommand::SetSpeed { speed }) {
            return false;
        }
        self.speed = speed;
        true
    }

    /// Last commanded or reported speed.
    pub fn speed(&self) -> i32 {
        self.speed
    }

    /// Set the travel direction.
    pub fn set_direction(&mut self, direction: Direction) -> bool {
        if !self.send(&ThrottleCommand::SetDirection { direction }) {
            return false;
        }
        self.direction = direction;
        true
    }

    /// Last commanded or reported direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Press or release a decoder function on the selected locomotive.
    pub fn set_function(&mut self, function: u8, pressed: bool) -> bool {
        if function > MAX_FUNCTION {
            return false;
        }
        let Some(address) = self.selected_address.clone() else {
            debug!("no locomotive selected");
            return false;
        };
        self.send(&ThrottleCommand::SetFunction {
            address,
            function,
            pressed,
        })
    }

    /// Command an emergency stop.
    pub fn emergency_stop(&mut self) -> bool {
        self.send(&ThrottleCommand::EmergencyStop)
    }

    /// Ask the server to require (or stop requiring) heartbeats.
    pub fn require_heartbeat(&mut self, required: bool) -> bool {
        self.send(&ThrottleCommand::RequireHeartbeat { required })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Hour-of-day of the fast clock.
    pub fn fast_time_hours(&self) -> u32 {
        self.fast_clock.hours()
    }

    /// Minute-of-hour of the fast clock.
    pub fn fast_time_minutes(&self) -> u32 {
        self.fast_clock.minutes()
    }

    /// Fast clock rate (simulated seconds per real second, 0 = stopped).
    pub fn fast_time_rate(&self) -> f64 {
        self.fast_clock.rate()
    }

    /// Fast clock time in seconds.
    pub fn fast_time_secs(&self) -> f64 {
        self.fast_clock.time_secs()
    }

    /// Heartbeat period announced by the server (0 = disabled).
    pub fn heartbeat_period_secs(&self) -> i32 {
        self.heartbeat.period_secs()
    }

    /// Protocol version announced by the server, if received.
    pub fn protocol_version(&self) -> Option<&str> {
        self.protocol_version.as_deref()
    }

    /// Currently selected locomotive address, if any.
    pub fn selected_address(&self) -> Option<&str> {
        self.selected_address.as_deref()
    }

    /// Speed step mode reported by the server, if any.
    pub fn speed_step_mode(&self) -> Option<SpeedStepMode> {
        self.speed_steps
    }

    /// Whether the fast clock changed during the last poll.
    pub fn clock_changed(&self) -> bool {
        self.flags.clock
    }

    /// Whether a usable heartbeat requirement arrived during the last poll.
    pub fn heartbeat_changed(&self) -> bool {
        self.flags.heartbeat
    }

    /// Whether locomotive state changed during the last poll.
    pub fn locomotive_changed(&self) -> bool {
        self.flags.locomotive
    }

    // ========================================================================
    // Outbound Helpers
    // ========================================================================

    /// Send a command if a transport is attached. Returns false (a no-op,
    /// not an error) when detached.
    fn send(&mut self, cmd: &ThrottleCommand) -> bool {
        match self.transport.as_deref_mut() {
            Some(transport) => {
                trace!("==> {}", cmd.to_command_string());
                transport.send(&cmd.encode());
                true
            }
            None => false,
        }
    }

    fn notify(&mut self, f: impl FnOnce(&mut dyn ThrottleDelegate)) {
        if let Some(delegate) = self.delegate.as_deref_mut() {
            f(delegate);
        }
    }
}

impl Default for ThrottleClient {
    fn default() -> Self {
        Self::new()
    }
}
