//! WiThrottle Wire Protocol
//!
//! This crate provides types and utilities for speaking the WiThrottle
//! protocol, the newline-delimited ASCII protocol JMRI servers (and compatible
//! devices such as the Digitrax LNWI) use to let a handheld throttle command
//! locomotives, track power, and the scaled fast clock.
//!
//! # Protocol Overview
//!
//! The protocol is a simple line-based text interface:
//!
//! - **Commands** (throttle → server): Text commands terminated with `\n`
//! - **Updates** (server → throttle): Text lines classified by a short fixed
//!   prefix (`PFT`, `PPA`, `*`, `VN`, `PW`, `MTA`, ...). The server sends two
//!   newlines after each command; the empty second line carries no data.
//! - **Fields**: Multi-field payloads are delimited by the literal property
//!   separator token `<;>`
//!
//! Commands the throttle does not act on are ignored rather than rejected;
//! the server side of the protocol is much richer than any one client.
//!
//! # Example
//!
//! ```rust,ignore
//! use withrottle_protocol::{LineCodec, ServerMessage, ThrottleCommand};
//!
//! // Build a command
//! let cmd = ThrottleCommand::SetSpeed { speed: 50 };
//! let line = cmd.encode();
//!
//! // Parse a server update
//! let msg = ServerMessage::parse("PFT1000<;>2.0");
//! ```

mod codec;
mod commands;
mod error;
mod responses;
mod types;

pub use codec::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
pub use types::*;
