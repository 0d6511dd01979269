//! Common types and field-parsing helpers used in the protocol.

use crate::error::{WireError, WireResult};

/// Literal token delimiting fields within a single command payload.
pub const PROPERTY_SEPARATOR: &str = "<;>";

/// Minimum throttle speed value.
pub const MIN_SPEED: i32 = 0;
/// Maximum throttle speed value (126-step range on the wire).
pub const MAX_SPEED: i32 = 126;
/// Highest decoder function number addressable over the wire.
pub const MAX_FUNCTION: u8 = 28;

/// Travel direction of a locomotive.
///
/// Wire encoding is a single character in `R` commands: `0` = reverse,
/// `1` = forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Moving backward.
    Reverse,
    /// Moving forward.
    #[default]
    Forward,
}

impl Direction {
    /// Decode from the wire character. Anything other than `'0'` is forward;
    /// forward is the protocol's fallback, not an error path.
    pub fn from_wire(c: char) -> Direction {
        if c == '0' {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }

    /// Encode to the wire character.
    pub fn to_wire(self) -> char {
        match self {
            Direction::Reverse => '0',
            Direction::Forward => '1',
        }
    }
}

/// Track power state reported by the server (`PPA` updates).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPower {
    /// Power is off.
    Off,
    /// Power is on.
    On,
    /// Server reported something other than on/off.
    Unknown,
}

impl TrackPower {
    /// Decode from the wire character.
    pub fn from_wire(c: char) -> TrackPower {
        match c {
            '0' => TrackPower::Off,
            '1' => TrackPower::On,
            _ => TrackPower::Unknown,
        }
    }
}

/// Speed step discretization a locomotive decoder supports.
///
/// The wire value is one of {1, 2, 4, 8, 16}; any other value is not a valid
/// mode and is dropped by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedStepMode {
    /// 128 speed steps (wire value 1).
    Steps128,
    /// 28 speed steps (wire value 2).
    Steps28,
    /// 27 speed steps (wire value 4).
    Steps27,
    /// 14 speed steps (wire value 8).
    Steps14,
    /// 28 speed steps, Motorola format (wire value 16).
    Steps28Motorola,
}

impl SpeedStepMode {
    /// Decode from the numeric wire value. Returns `None` for anything
    /// outside the closed set.
    pub fn from_wire(value: i32) -> Option<SpeedStepMode> {
        match value {
            1 => Some(SpeedStepMode::Steps128),
            2 => Some(SpeedStepMode::Steps28),
            4 => Some(SpeedStepMode::Steps27),
            8 => Some(SpeedStepMode::Steps14),
            16 => Some(SpeedStepMode::Steps28Motorola),
            _ => None,
        }
    }

    /// The numeric wire value.
    pub fn to_wire(self) -> i32 {
        match self {
            SpeedStepMode::Steps128 => 1,
            SpeedStepMode::Steps28 => 2,
            SpeedStepMode::Steps27 => 4,
            SpeedStepMode::Steps14 => 8,
            SpeedStepMode::Steps28Motorola => 16,
        }
    }
}

/// Validate a locomotive address of the form `S<digits>` or `L<digits>`
/// (short or long DCC address).
pub fn validate_address(address: &str) -> WireResult<()> {
    let mut chars = address.chars();
    let leader = chars.next();
    let rest = chars.as_str();

    let kind_ok = matches!(leader, Some('S') | Some('L'));
    if kind_ok && !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(WireError::InvalidAddress(address.to_string()))
    }
}

/// Parse a leading signed integer the way Arduino `String::toInt` does:
/// optional whitespace, optional sign, then digits up to the first
/// non-digit. Anything else parses to 0. The protocol relies on this —
/// a malformed numeric field means "zero", not "error".
pub fn lenient_int(s: &str) -> i32 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    s[..end].parse().unwrap_or(0)
}

/// Parse a leading float (`String::toFloat` semantics): optional sign,
/// digits, optional fractional part. Anything else parses to 0.0.
pub fn lenient_float(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}
