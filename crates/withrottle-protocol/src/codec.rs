//! Line-based codec for WiThrottle communication.
//!
//! The protocol uses newline-terminated ASCII lines in both directions. The
//! server sends *two* newlines after every command; the empty second line
//! carries no data and must not surface as a command.

use bytes::BytesMut;

use crate::error::{WireError, WireResult};

/// Maximum command line length, including the reserved terminator slot.
/// A completed line is therefore always shorter than `MAX_LINE_LENGTH - 1`.
pub const MAX_LINE_LENGTH: usize = 1024;

/// A codec for assembling and writing protocol lines.
///
/// Bytes arrive one at a time from a non-blocking transport, possibly split
/// across polls. The codec accumulates them into a fixed-capacity buffer and
/// yields a completed line on each newline.
#[derive(Debug)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
        }
    }

    /// Feed one received byte into the codec.
    ///
    /// Returns `Ok(Some(line))` when the byte completes a non-empty line,
    /// `Ok(None)` when more data is needed (or the byte was the protocol's
    /// mandated second trailing newline), and `Err` when the line reached
    /// the capacity bound. On overflow the partial line is discarded and the
    /// codec is immediately ready for the next line; the condition is
    /// diagnostic, not fatal.
    pub fn push_byte(&mut self, byte: u8) -> WireResult<Option<String>> {
        if byte == b'\n' {
            if self.buffer.is_empty() {
                // second newline of the pair the server sends
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&self.buffer).to_string();
            self.buffer.clear();
            return Ok(Some(line));
        }

        self.buffer.extend_from_slice(&[byte]);
        if self.buffer.len() >= MAX_LINE_LENGTH - 1 {
            let actual = self.buffer.len();
            log::debug!("line overflow at {actual} bytes, discarding");
            self.buffer.clear();
            return Err(WireError::LineTooLong {
                max: MAX_LINE_LENGTH - 1,
                actual,
            });
        }

        Ok(None)
    }

    /// Encode a command for transmission.
    ///
    /// Appends the newline terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(b'\n');
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any partially assembled line.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
