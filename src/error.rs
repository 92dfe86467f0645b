//! Error types for the wattchecker library.

use thiserror::Error;

use crate::protocol::CommandCode;
use crate::session::Phase;

/// The main error type for wattchecker operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport operation timed out.
    #[error("transport timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport is not open.
    #[error("not connected")]
    NotConnected,

    /// A read would have gone past the end of the receive buffer.
    #[error("read of {count} bytes at offset {offset} exceeds buffer of {capacity} bytes")]
    BoundsViolation {
        offset: usize,
        count: usize,
        capacity: usize,
    },

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The device answered with a nonzero status byte.
    #[error("{command:?} rejected by device with status {code:#04x}")]
    Status { command: CommandCode, code: u8 },

    /// The response length does not match the command's response length.
    #[error("short response: expected {expected} bytes, got {got}")]
    ShortResponse { expected: usize, got: usize },

    /// Command issued out of order for the session state.
    #[error("command requires session phase {expected}, session is {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    /// Malformed response data.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Invalid or unreadable configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Metrics registration or encoding error.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Returns true if the error came from the underlying byte stream.
    #[must_use]
    pub const fn is_io_failure(&self) -> bool {
        matches!(
            self,
            Self::Serial(_) | Self::Io(_) | Self::Timeout { .. } | Self::NotConnected
        )
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

/// Frame-specific errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Frame too short to contain header, length, command and status.
    #[error("frame too short: need at least {min} bytes, got {got}")]
    TooShort { min: usize, got: usize },

    /// Frame payload exceeds maximum size.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// Response checksum does not match the recomputed value.
    #[error("checksum mismatch: frame carries {received:#04x}, computed {computed:#04x}")]
    ChecksumMismatch { received: u8, computed: u8 },
}

/// Result type alias for wattchecker operations.
pub type Result<T> = std::result::Result<T, Error>;
