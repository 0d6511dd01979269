//! WiThrottle Protocol Engine
//!
//! This crate implements the client side of the WiThrottle protocol: the
//! state machine a handheld or embedded throttle runs against a JMRI server
//! (or compatible device such as the Digitrax LNWI). It tracks the server's
//! fast clock, answers heartbeat requirements, maintains the locomotive
//! session, and reports confirmed state changes to a delegate.
//!
//! # Design
//!
//! The engine is single-threaded and cooperative. The host attaches an
//! already-connected byte stream ([`Transport`]) and then calls
//! [`ThrottleClient::poll`] once per loop cycle; the call never blocks.
//! Waiting is expressed as elapsed-time comparisons inside the poll, not as
//! sleeping.
//!
//! Wire-level types (line codec, command grammar, message classification)
//! live in the `withrottle-protocol` crate, re-exported here for
//! convenience.
//!
//! # Example
//!
//! ```rust,ignore
//! use withrottle_client::{ThrottleClient, ThrottleConfig};
//!
//! let mut client = ThrottleClient::with_config(ThrottleConfig {
//!     device_name: Some("Cab 1".to_string()),
//!     ..Default::default()
//! });
//!
//! let stream = std::net::TcpStream::connect("layout:12090")?;
//! stream.set_nonblocking(true)?;
//! client.connect(Box::new(stream));
//!
//! loop {
//!     if client.poll() {
//!         // react to updated clock/heartbeat/locomotive state
//!     }
//!     // interleave other work
//! }
//! ```

mod client;
mod delegate;
mod fastclock;
mod heartbeat;
mod transport;

pub use client::*;
pub use delegate::*;
pub use fastclock::*;
pub use heartbeat::*;
pub use transport::*;

pub use withrottle_protocol::{
    Direction, SpeedStepMode, ThrottleCommand, TrackPower, WireError,
};
