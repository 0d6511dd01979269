//! Classification of server-to-throttle lines.
//!
//! Every complete line is classified by strict fixed-prefix matching, first
//! match wins. Payload *fields* are not interpreted here — what a locomotive
//! action means depends on session state, so field semantics live with the
//! client engine. The only decoding done at this boundary is for payloads
//! that are pure functions of the line, like track power.

use crate::types::{TrackPower, PROPERTY_SEPARATOR};

/// A server-to-throttle message, classified by command prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Fast clock update: `PFT<time>` or `PFT<time><;><rate>`.
    FastTime(String),

    /// Track power state: `PPA{0|1|...}`.
    TrackPower(TrackPower),

    /// Heartbeat requirement: `*<seconds>`.
    Heartbeat(String),

    /// Protocol version announcement: `VN<version>`.
    ProtocolVersion(String),

    /// Web server port announcement: `PW<port>`.
    WebPort(String),

    /// Locomotive action: `MTA<addr-or-*><;><action>`.
    LocomotiveAction(String),

    /// Address added to the throttle: `MT+<addr><;><roster entry>`.
    AddressAdded {
        /// Locomotive address.
        address: String,
        /// Roster entry text.
        entry: String,
    },

    /// Address released from the throttle: `MT-<addr><;>[dr]`.
    AddressRemoved {
        /// Locomotive address.
        address: String,
        /// Release/dispatch command character(s).
        command: String,
    },

    /// Another throttle holds the address; a steal is required to acquire
    /// it: `MTS<addr><;><addr>`.
    AddressStealNeeded {
        /// Locomotive address.
        address: String,
        /// Roster entry text.
        entry: String,
    },

    /// Any other line. The server sends many commands a throttle does not
    /// act on; these are explicitly not errors.
    Ignored,
}

impl ServerMessage {
    /// Classify a complete line.
    ///
    /// Each prefix check is guarded by a minimum length; a line shorter than
    /// a prefix requirement falls through to the next candidate, and
    /// ultimately to [`ServerMessage::Ignored`].
    pub fn parse(line: &str) -> ServerMessage {
        let len = line.len();

        if len > 3 && line.starts_with("PFT") {
            ServerMessage::FastTime(line[3..].to_string())
        } else if len > 3 && line.starts_with("PPA") {
            let state = line[3..].chars().next().map(TrackPower::from_wire);
            // guarded by len > 3, the payload always has a first char
            ServerMessage::TrackPower(state.unwrap_or(TrackPower::Unknown))
        } else if len > 1 && line.starts_with('*') {
            ServerMessage::Heartbeat(line[1..].to_string())
        } else if len > 2 && line.starts_with("VN") {
            ServerMessage::ProtocolVersion(line[2..].to_string())
        } else if len > 2 && line.starts_with("PW") {
            ServerMessage::WebPort(line[2..].to_string())
        } else if len > 3 && line.starts_with("MTA") {
            ServerMessage::LocomotiveAction(line[3..].to_string())
        } else if len > 3 && line.starts_with("MT+") {
            let (address, entry) = split_property(&line[3..]);
            ServerMessage::AddressAdded { address, entry }
        } else if len > 3 && line.starts_with("MT-") {
            let (address, command) = split_property(&line[3..]);
            ServerMessage::AddressRemoved { address, command }
        } else if len > 3 && line.starts_with("MTS") {
            let (address, entry) = split_property(&line[3..]);
            ServerMessage::AddressStealNeeded { address, entry }
        } else {
            ServerMessage::Ignored
        }
    }
}

/// Split a payload at the first property separator. A payload with no
/// separator is treated best-effort as an address with an empty second field.
fn split_property(payload: &str) -> (String, String) {
    match payload.find(PROPERTY_SEPARATOR) {
        Some(p) => (
            payload[..p].to_string(),
            payload[p + PROPERTY_SEPARATOR.len()..].to_string(),
        ),
        None => (payload.to_string(), String::new()),
    }
}
