//! End-to-end tests for the throttle protocol engine.
//!
//! These drive a `ThrottleClient` over a shared-state mock transport and a
//! recording delegate, using `poll_at` with synthetic instants so that no
//! test has to sleep through a heartbeat period or a fast-clock second.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use withrottle_client::{
    Direction, SpeedStepMode, ThrottleClient, ThrottleConfig, ThrottleDelegate, TrackPower,
    Transport,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Default)]
struct WireState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

/// Handle to both ends of the mock wire. Clones share state, so the test
/// keeps one handle while the client owns the transport.
#[derive(Clone, Default)]
struct MockWire(Rc<RefCell<WireState>>);

impl MockWire {
    /// Queue bytes as if the server had sent them.
    fn push_server(&self, data: &[u8]) {
        self.0.borrow_mut().rx.extend(data.iter().copied());
    }

    /// Drain everything the client transmitted, split into lines.
    fn take_sent_lines(&self) -> Vec<String> {
        let raw = std::mem::take(&mut self.0.borrow_mut().tx);
        String::from_utf8(raw)
            .unwrap()
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }
}

struct MockTransport(MockWire);

impl Transport for MockTransport {
    fn recv(&mut self, buf: &mut [u8]) -> usize {
        let mut state = self.0 .0.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match state.rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    fn send(&mut self, data: &[u8]) {
        self.0 .0.borrow_mut().tx.extend_from_slice(data);
    }
}

// ============================================================================
// Recording Delegate
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Version(String),
    FastTime(u32),
    FastTimeRate(f64),
    HeartbeatConfig(u32),
    Function(u8, bool),
    Speed(i32),
    DirectionChanged(Direction),
    SpeedSteps(SpeedStepMode),
    WebPort(i32),
    Power(TrackPower),
    Added(String, String),
    Removed(String, String),
    StealNeeded(String, String),
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Vec<Event>>>);

impl Recorder {
    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut self.0.borrow_mut())
    }
}

struct RecordingDelegate(Recorder);

impl ThrottleDelegate for RecordingDelegate {
    fn received_version(&mut self, version: &str) {
        self.0 .0.borrow_mut().push(Event::Version(version.to_string()));
    }
    fn fast_time_changed(&mut self, time: u32) {
        self.0 .0.borrow_mut().push(Event::FastTime(time));
    }
    fn fast_time_rate_changed(&mut self, rate: f64) {
        self.0 .0.borrow_mut().push(Event::FastTimeRate(rate));
    }
    fn heartbeat_config(&mut self, seconds: u32) {
        self.0 .0.borrow_mut().push(Event::HeartbeatConfig(seconds));
    }
    fn received_function_state(&mut self, function: u8, state: bool) {
        self.0 .0.borrow_mut().push(Event::Function(function, state));
    }
    fn received_speed(&mut self, speed: i32) {
        self.0 .0.borrow_mut().push(Event::Speed(speed));
    }
    fn received_direction(&mut self, direction: Direction) {
        self.0 .0.borrow_mut().push(Event::DirectionChanged(direction));
    }
    fn received_speed_steps(&mut self, steps: SpeedStepMode) {
        self.0 .0.borrow_mut().push(Event::SpeedSteps(steps));
    }
    fn received_web_port(&mut self, port: i32) {
        self.0 .0.borrow_mut().push(Event::WebPort(port));
    }
    fn received_track_power(&mut self, state: TrackPower) {
        self.0 .0.borrow_mut().push(Event::Power(state));
    }
    fn address_added(&mut self, address: &str, entry: &str) {
        self.0
             .0
            .borrow_mut()
            .push(Event::Added(address.to_string(), entry.to_string()));
    }
    fn address_removed(&mut self, address: &str, command: &str) {
        self.0
             .0
            .borrow_mut()
            .push(Event::Removed(address.to_string(), command.to_string()));
    }
    fn address_steal_needed(&mut self, address: &str, entry: &str) {
        self.0
             .0
            .borrow_mut()
            .push(Event::StealNeeded(address.to_string(), entry.to_string()));
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// A connected client with a mock wire and recording delegate attached.
fn connected_client() -> (ThrottleClient, MockWire, Recorder) {
    init_tracing();
    let wire = MockWire::default();
    let recorder = Recorder::default();
    let mut client = ThrottleClient::new();
    client.set_delegate(Box::new(RecordingDelegate(recorder.clone())));
    client.connect(Box::new(MockTransport(wire.clone())));
    (client, wire, recorder)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

// ============================================================================
// Fast Clock
// ============================================================================

#[test]
fn test_fast_time_with_rate() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"PFT1000<;>2.0\n\n");

    assert!(client.poll());
    assert!(client.clock_changed());
    assert_eq!(client.fast_time_secs(), 1000.0);
    assert_eq!(client.fast_time_rate(), 2.0);
    assert_eq!(
        recorder.take(),
        vec![Event::FastTime(1000), Event::FastTimeRate(2.0)]
    );
}

#[test]
fn test_fast_time_without_rate_leaves_rate() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"PFT1000<;>2.0\n\n");
    client.poll();
    recorder.take();

    wire.push_server(b"PFT5000\n\n");
    assert!(client.poll());
    assert!(client.clock_changed());
    assert_eq!(client.fast_time_secs(), 5000.0);
    assert_eq!(client.fast_time_rate(), 2.0);
    assert_eq!(recorder.take(), vec![Event::FastTime(5000)]);
}

#[test]
fn test_fast_time_non_numeric_parses_to_zero() {
    let (mut client, wire, _recorder) = connected_client();
    wire.push_server(b"PFTxyz<;>abc\n\n");

    assert!(client.poll());
    assert_eq!(client.fast_time_secs(), 0.0);
    assert_eq!(client.fast_time_rate(), 0.0);
    assert!(client.clock_changed());
}

#[test]
fn test_fast_clock_tick_advances_by_rate() {
    let (mut client, wire, recorder) = connected_client();
    let t0 = Instant::now();
    client.poll_at(t0); // anchors the tick interval

    wire.push_server(b"PFT1000<;>2.0\n\n");
    client.poll_at(t0);
    recorder.take();

    assert!(client.poll_at(t0 + secs(1)));
    assert!(client.clock_changed());
    assert_eq!(client.fast_time_secs(), 1002.0);
    assert_eq!(recorder.take(), vec![Event::FastTime(1002)]);
}

#[test]
fn test_fast_clock_rate_zero_tick_is_unchanged() {
    let (mut client, wire, recorder) = connected_client();
    let t0 = Instant::now();
    client.poll_at(t0);

    wire.push_server(b"PFT1000\n\n"); // rate stays 0
    client.poll_at(t0);
    recorder.take();

    assert!(!client.poll_at(t0 + secs(1)));
    assert!(!client.clock_changed());
    assert_eq!(client.fast_time_secs(), 1000.0);
    assert!(recorder.take().is_empty());
}

#[test]
fn test_fast_time_hours_minutes() {
    let (mut client, wire, _recorder) = connected_client();
    // 13:37:42
    let time = 13 * 3600 + 37 * 60 + 42;
    wire.push_server(format!("PFT{time}\n\n").as_bytes());
    client.poll();
    assert_eq!(client.fast_time_hours(), 13);
    assert_eq!(client.fast_time_minutes(), 37);
}

// ============================================================================
// Heartbeat
// ============================================================================

#[test]
fn test_heartbeat_period_set() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"*10\n\n");

    assert!(client.poll());
    assert!(client.heartbeat_changed());
    assert_eq!(client.heartbeat_period_secs(), 10);
    assert_eq!(recorder.take(), vec![Event::HeartbeatConfig(10)]);
}

#[test]
fn test_heartbeat_period_zero_is_unusable() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"*0\n\n");

    assert!(!client.poll());
    assert!(!client.heartbeat_changed());
    assert!(recorder.take().is_empty());
}

#[test]
fn test_heartbeat_ack_at_guard_threshold() {
    let (mut client, wire, _recorder) = connected_client();
    let t0 = Instant::now();
    client.poll_at(t0); // anchors the schedule

    wire.push_server(b"*10\n\n");
    client.poll_at(t0);
    wire.take_sent_lines();

    // 7 seconds in: not yet owed
    assert!(!client.poll_at(t0 + secs(7)));
    assert!(wire.take_sent_lines().is_empty());

    // 8 seconds = 0.8 * period: heartbeat goes out
    assert!(client.poll_at(t0 + secs(8)));
    assert_eq!(wire.take_sent_lines(), vec!["*".to_string()]);

    // the window restarts from the transmission
    assert!(!client.poll_at(t0 + secs(15)));
    assert!(wire.take_sent_lines().is_empty());
    assert!(client.poll_at(t0 + secs(16)));
    assert_eq!(wire.take_sent_lines(), vec!["*".to_string()]);
}

// ============================================================================
// Locomotive Actions (inbound)
// ============================================================================

#[test]
fn test_speed_in_range() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"MTA*<;>V50\n\n");

    assert!(client.poll());
    assert!(client.locomotive_changed());
    assert_eq!(client.speed(), 50);
    assert_eq!(recorder.take(), vec![Event::Speed(50)]);
}

#[test]
fn test_speed_out_of_range_clamps_to_zero() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"MTA*<;>V200\n\n");

    assert!(client.poll());
    assert_eq!(client.speed(), 0);
    assert_eq!(recorder.take(), vec![Event::Speed(0)]);
}

#[test]
fn test_speed_steps_closed_set() {
    let (mut client, wire, recorder) = connected_client();

    // 3 is not a valid mode: dropped, no notification, no state change
    wire.push_server(b"MTA*<;>s3\n\n");
    client.poll();
    assert!(client.speed_step_mode().is_none());
    assert!(!client.locomotive_changed());
    assert!(recorder.take().is_empty());

    wire.push_server(b"MTA*<;>s4\n\n");
    client.poll();
    assert!(client.locomotive_changed());
    assert_eq!(client.speed_step_mode(), Some(SpeedStepMode::Steps27));
    assert_eq!(recorder.take(), vec![Event::SpeedSteps(SpeedStepMode::Steps27)]);
}

#[test]
fn test_direction_updates() {
    let (mut client, wire, recorder) = connected_client();

    wire.push_server(b"MTA*<;>R0\n\n");
    client.poll();
    assert_eq!(client.direction(), Direction::Reverse);
    assert_eq!(
        recorder.take(),
        vec![Event::DirectionChanged(Direction::Reverse)]
    );

    // malformed direction character: forward is the fallback
    wire.push_server(b"MTA*<;>Rq\n\n");
    client.poll();
    assert_eq!(client.direction(), Direction::Forward);
    assert_eq!(
        recorder.take(),
        vec![Event::DirectionChanged(Direction::Forward)]
    );

    // wrong length: no state change, no notification
    wire.push_server(b"MTA*<;>R01\n\n");
    client.poll();
    assert_eq!(client.direction(), Direction::Forward);
    assert!(recorder.take().is_empty());
}

#[test]
fn test_function_state() {
    let (mut client, wire, recorder) = connected_client();

    wire.push_server(b"MTA*<;>F112\n\n");
    wire.push_server(b"MTA*<;>F03\n\n");
    wire.push_server(b"MTA*<;>F00\n\n");
    client.poll();
    assert_eq!(
        recorder.take(),
        vec![
            Event::Function(12, true),
            Event::Function(3, false),
            Event::Function(0, false),
        ]
    );
}

#[test]
fn test_function_number_zero_vs_parse_failure() {
    let (mut client, wire, recorder) = connected_client();

    // parses to 0 but the text is not literally "0": suppressed
    wire.push_server(b"MTA*<;>F1xy\n\n");
    assert!(client.poll()); // the action was still recognized
    assert!(recorder.take().is_empty());

    // literal function zero is reported
    wire.push_server(b"MTA*<;>F10\n\n");
    client.poll();
    assert_eq!(recorder.take(), vec![Event::Function(0, true)]);
}

#[test]
fn test_selected_address_prefix_is_stripped() {
    let (mut client, wire, recorder) = connected_client();
    client.add_locomotive("S47");
    wire.take_sent_lines();

    wire.push_server(b"MTAS47<;>V30\n\n");
    client.poll();
    assert_eq!(client.speed(), 30);
    assert_eq!(recorder.take(), vec![Event::Speed(30)]);

    // the wildcard prefix still matches alongside the selection
    wire.push_server(b"MTA*<;>V40\n\n");
    client.poll();
    assert_eq!(recorder.take(), vec![Event::Speed(40)]);
}

#[test]
fn test_unmatched_prefix_goes_unrecognized() {
    let (mut client, wire, recorder) = connected_client();

    // no selection, not the wildcard: remainder "S99<;>V50" starts with an
    // unrecognized action and is dropped without state change
    wire.push_server(b"MTAS99<;>V50\n\n");
    assert!(client.poll());
    assert_eq!(client.speed(), 0);
    assert!(!client.locomotive_changed());
    assert!(recorder.take().is_empty());
}

// ============================================================================
// Other Server Messages
// ============================================================================

#[test]
fn test_track_power() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"PPA0\n\nPPA1\n\nPPA9\n\n");
    client.poll();
    assert_eq!(
        recorder.take(),
        vec![
            Event::Power(TrackPower::Off),
            Event::Power(TrackPower::On),
            Event::Power(TrackPower::Unknown),
        ]
    );
}

#[test]
fn test_protocol_version_and_web_port() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"VN2.0\n\nPW12080\n\n");

    assert!(client.poll());
    assert_eq!(client.protocol_version(), Some("2.0"));
    assert_eq!(
        recorder.take(),
        vec![Event::Version("2.0".to_string()), Event::WebPort(12080)]
    );
}

#[test]
fn test_roster_address_callbacks() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"MT+S47<;>Switcher\n\n");
    wire.push_server(b"MT-S47<;>d\n\n");
    wire.push_server(b"MTSS47<;>S47\n\n");
    client.poll();
    assert_eq!(
        recorder.take(),
        vec![
            Event::Added("S47".to_string(), "Switcher".to_string()),
            Event::Removed("S47".to_string(), "d".to_string()),
            Event::StealNeeded("S47".to_string(), "S47".to_string()),
        ]
    );
}

#[test]
fn test_unrecognized_lines_are_ignored() {
    let (mut client, wire, recorder) = connected_client();
    wire.push_server(b"RL2]\\[RGP Express}|{L123\n\nHTJMRI\n\n");
    assert!(!client.poll());
    assert!(recorder.take().is_empty());
}

// ============================================================================
// Outbound Operations
// ============================================================================

#[test]
fn test_locomotive_selection_commands() {
    let (mut client, wire, _recorder) = connected_client();

    assert!(client.add_locomotive("S47"));
    assert_eq!(client.selected_address(), Some("S47"));
    assert_eq!(wire.take_sent_lines(), vec!["MT+S47<;>S47".to_string()]);

    assert!(client.release_locomotive());
    assert!(client.selected_address().is_none());
    assert_eq!(wire.take_sent_lines(), vec!["MT-*<;>".to_string()]);

    assert!(client.steal_locomotive("L1234"));
    assert_eq!(client.selected_address(), Some("L1234"));
    assert_eq!(wire.take_sent_lines(), vec!["MTSL1234<;>L1234".to_string()]);

    // malformed addresses are rejected before anything is sent
    assert!(!client.add_locomotive("47"));
    assert!(!client.add_locomotive("Sx"));
    assert!(wire.take_sent_lines().is_empty());
}

#[test]
fn test_speed_direction_and_stop_commands() {
    let (mut client, wire, _recorder) = connected_client();

    assert!(client.set_speed(50));
    assert_eq!(client.speed(), 50);
    assert!(!client.set_speed(127));
    assert!(!client.set_speed(-1));
    assert_eq!(client.speed(), 50);

    assert!(client.set_direction(Direction::Reverse));
    assert_eq!(client.direction(), Direction::Reverse);
    assert!(client.emergency_stop());

    assert_eq!(
        wire.take_sent_lines(),
        vec![
            "MTA*<;>V50".to_string(),
            "MTA*<;>R0".to_string(),
            "MTA*<;>X".to_string(),
        ]
    );
}

#[test]
fn test_function_commands_need_selection() {
    let (mut client, wire, _recorder) = connected_client();

    assert!(!client.set_function(3, true));
    assert!(wire.take_sent_lines().is_empty());

    client.add_locomotive("S47");
    wire.take_sent_lines();

    assert!(client.set_function(12, true));
    assert!(client.set_function(3, false));
    assert!(!client.set_function(29, true));
    assert_eq!(
        wire.take_sent_lines(),
        vec!["MTAS47<;>F112".to_string(), "MTAS47<;>F03".to_string()]
    );
}

#[test]
fn test_heartbeat_requirement_toggle() {
    let (mut client, wire, _recorder) = connected_client();
    client.require_heartbeat(true);
    client.require_heartbeat(false);
    assert_eq!(
        wire.take_sent_lines(),
        vec!["*+".to_string(), "*-".to_string()]
    );
}

#[test]
fn test_connect_announces_configuration() {
    init_tracing();
    let wire = MockWire::default();
    let mut client = ThrottleClient::with_config(ThrottleConfig {
        device_name: Some("Cab 1".to_string()),
        device_id: Some("a1b2c3".to_string()),
        require_heartbeat: true,
    });
    client.connect(Box::new(MockTransport(wire.clone())));
    assert_eq!(
        wire.take_sent_lines(),
        vec!["NCab 1".to_string(), "HUa1b2c3".to_string(), "*+".to_string()]
    );
}

#[test]
fn test_device_identification_sent_on_assignment() {
    let (mut client, wire, _recorder) = connected_client();
    assert!(client.set_device_name("Cab 9"));
    assert!(client.set_device_id("cafe01"));
    assert_eq!(
        wire.take_sent_lines(),
        vec!["NCab 9".to_string(), "HUcafe01".to_string()]
    );
}

// ============================================================================
// Session Lifecycle
// ============================================================================

#[test]
fn test_disconnect_resets_all_state() {
    let (mut client, wire, _recorder) = connected_client();
    wire.push_server(b"PFT1000<;>2.0\n\n*10\n\nVN2.0\n\n");
    client.poll();
    client.add_locomotive("S47");
    client.set_speed(50);

    client.disconnect();
    assert!(!client.is_connected());

    let wire2 = MockWire::default();
    client.connect(Box::new(MockTransport(wire2.clone())));
    assert_eq!(client.fast_time_secs(), 0.0);
    assert_eq!(client.fast_time_rate(), 0.0);
    assert_eq!(client.heartbeat_period_secs(), 0);
    assert!(client.selected_address().is_none());
    assert_eq!(client.speed(), 0);
    assert_eq!(client.direction(), Direction::Forward);
    assert!(client.protocol_version().is_none());
}

#[test]
fn test_idle_poll_is_idempotent() {
    let (mut client, _wire, recorder) = connected_client();
    let t0 = Instant::now();
    client.poll_at(t0);

    assert!(!client.poll_at(t0 + Duration::from_millis(100)));
    assert!(!client.clock_changed());
    assert!(!client.heartbeat_changed());
    assert!(!client.locomotive_changed());
    assert!(recorder.take().is_empty());
}

#[test]
fn test_partial_reads_across_polls() {
    let (mut client, wire, recorder) = connected_client();

    wire.push_server(b"PFT10");
    assert!(!client.poll());
    wire.push_server(b"00\n\n");
    assert!(client.poll());
    assert_eq!(client.fast_time_secs(), 1000.0);
    assert_eq!(recorder.take(), vec![Event::FastTime(1000)]);
}

#[test]
fn test_oversized_line_is_discarded_not_fatal() {
    let (mut client, wire, recorder) = connected_client();

    let mut noise = vec![b'a'; 1100];
    noise.push(b'\n');
    wire.push_server(&noise);
    wire.push_server(b"VN2.0\n\n");

    client.poll();
    // the engine survived the overflow and parsed the next line
    assert_eq!(client.protocol_version(), Some("2.0"));
    assert_eq!(recorder.take(), vec![Event::Version("2.0".to_string())]);
}
