//! Commands a throttle sends to the server.
//!
//! All commands are fire-and-forget: no acknowledgment is awaited. When the
//! server confirms anything, the confirmation arrives later as an ordinary
//! inbound line.

use crate::codec::LineCodec;
use crate::types::{Direction, PROPERTY_SEPARATOR};

/// Commands that can be sent to a WiThrottle server.
///
/// The encoded grammars are bit-exact; existing servers match on them
/// literally.
#[derive(Debug, Clone, PartialEq)]
pub enum ThrottleCommand {
    // ========== Locomotive Session ==========
    /// Select a locomotive: `MT+<addr><;><roster name>`.
    SelectLocomotive {
        /// Locomotive address (`S<digits>` or `L<digits>`).
        address: String,
        /// Roster name sent with the selection.
        roster_name: String,
    },

    /// Steal a locomotive held by another throttle: `MTS<addr><;><addr>`.
    StealLocomotive {
        /// Locomotive address.
        address: String,
    },

    /// Release the current selection: `MT-*<;>`.
    ReleaseLocomotive,

    // ========== Locomotive Control ==========
    /// Set throttle speed: `MTA*<;>V<speed>`.
    SetSpeed {
        /// Speed in [0, 126].
        speed: i32,
    },

    /// Set travel direction: `MTA*<;>R{0|1}`.
    SetDirection {
        /// Direction to set.
        direction: Direction,
    },

    /// Emergency stop: `MTA*<;>X`.
    EmergencyStop,

    /// Press or release a decoder function: `MTA<addr><;>F{0|1}<num>`.
    SetFunction {
        /// Locomotive address.
        address: String,
        /// Function number (0-28).
        function: u8,
        /// True for pressed (on).
        pressed: bool,
    },

    // ========== Session Keepalive ==========
    /// Heartbeat acknowledgment: `*`.
    HeartbeatAck,

    /// Toggle the server-side heartbeat requirement: `*+` / `*-`.
    RequireHeartbeat {
        /// True to require heartbeats.
        required: bool,
    },

    // ========== Device Identification ==========
    /// Announce the device name: `N<name>`.
    DeviceName {
        /// Human-readable throttle name.
        name: String,
    },

    /// Announce the device identifier: `HU<id>`.
    DeviceId {
        /// Unique throttle identifier.
        id: String,
    },
}

impl ThrottleCommand {
    /// Format the command as its wire string, without the terminator.
    pub fn to_command_string(&self) -> String {
        match self {
            ThrottleCommand::SelectLocomotive {
                address,
                roster_name,
            } => {
                format!("MT+{address}{PROPERTY_SEPARATOR}{roster_name}")
            }
            ThrottleCommand::StealLocomotive { address } => {
                format!("MTS{address}{PROPERTY_SEPARATOR}{address}")
            }
            ThrottleCommand::ReleaseLocomotive => format!("MT-*{PROPERTY_SEPARATOR}"),
            ThrottleCommand::SetSpeed { speed } => format!("MTA*{PROPERTY_SEPARATOR}V{speed}"),
            ThrottleCommand::SetDirection { direction } => {
                format!("MTA*{PROPERTY_SEPARATOR}R{}", direction.to_wire())
            }
            ThrottleCommand::EmergencyStop => format!("MTA*{PROPERTY_SEPARATOR}X"),
            ThrottleCommand::SetFunction {
                address,
                function,
                pressed,
            } => {
                let state = if *pressed { '1' } else { '0' };
                format!("MTA{address}{PROPERTY_SEPARATOR}F{state}{function}")
            }
            ThrottleCommand::HeartbeatAck => "*".to_string(),
            ThrottleCommand::RequireHeartbeat { required } => {
                if *required { "*+" } else { "*-" }.to_string()
            }
            ThrottleCommand::DeviceName { name } => format!("N{name}"),
            ThrottleCommand::DeviceId { id } => format!("HU{id}"),
        }
    }

    /// Encode the command for transmission, newline-terminated.
    pub fn encode(&self) -> Vec<u8> {
        LineCodec::encode_command(&self.to_command_string())
    }
}
