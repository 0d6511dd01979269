//! Error types for the wire protocol.

use thiserror::Error;

/// Errors that can occur when working with the wire protocol.
///
/// None of these are fatal to a running session: an overlong line is
/// discarded and the codec keeps assembling the next one, and an invalid
/// address simply means the command is not sent.
#[derive(Debug, Error)]
pub enum WireError {
    /// A received line reached the codec capacity and was discarded.
    #[error("line too long: max {max} bytes, got {actual}")]
    LineTooLong { max: usize, actual: usize },

    /// A locomotive address that is not `S<digits>` or `L<digits>`.
    #[error("invalid locomotive address: {0}")]
    InvalidAddress(String),
}

/// Result type alias for wire operations.
pub type WireResult<T> = Result<T, WireError>;
