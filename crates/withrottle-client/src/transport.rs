//! Byte-stream transport seam.
//!
//! The engine never owns connection setup: the host hands it an
//! already-connected duplex byte stream and is responsible for detecting
//! transport loss and reconnecting. All the engine needs is a non-blocking
//! read and a fire-and-forget write.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use tracing::warn;

/// A byte-oriented duplex stream the engine reads protocol lines from and
/// writes newline-terminated commands to.
///
/// Both operations must return promptly; the engine is driven by a
/// cooperative poll loop and never blocks.
pub trait Transport {
    /// Read whatever bytes are pending into `buf`.
    ///
    /// Returns the number of bytes read; 0 means nothing is pending right
    /// now (or the stream reported an error, which the engine treats the
    /// same way — loss detection is the host's job).
    fn recv(&mut self, buf: &mut [u8]) -> usize;

    /// Write an already-terminated command line.
    ///
    /// Fire-and-forget: failures are logged, never surfaced.
    fn send(&mut self, data: &[u8]);
}

/// [`TcpStream`] in non-blocking mode is the usual transport against a JMRI
/// server. The host must have called `set_nonblocking(true)` before handing
/// the stream over.
impl Transport for TcpStream {
    fn recv(&mut self, buf: &mut [u8]) -> usize {
        match Read::read(self, buf) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::WouldBlock => 0,
            Err(err) => {
                warn!("transport read failed: {err}");
                0
            }
        }
    }

    fn send(&mut self, data: &[u8]) {
        if let Err(err) = self.write_all(data) {
            warn!("transport write failed: {err}");
        }
    }
}
