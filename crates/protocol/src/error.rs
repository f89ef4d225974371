//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Serialization error from postcard
    #[error("Serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    /// Incompatible protocol version detected
    #[error(
        "Incompatible protocol version: {major}.{minor} (expected {expected_major}.{expected_minor})"
    )]
    IncompatibleVersion {
        major: u8,
        minor: u8,
        expected_major: u8,
        expected_minor: u8,
    },

    /// A message arrived that is not valid in the current direction
    #[error("Unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// Frame length exceeds maximum allowed size
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Incomplete frame data
    #[error("Incomplete frame: expected {expected} bytes, got {actual}")]
    IncompleteFrame { expected: usize, actual: usize },

    /// I/O error during frame operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
