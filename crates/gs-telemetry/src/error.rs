//! Error types for telemetry acquisition.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Failures reported by a bus transport. All of them are recoverable.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No response from device")]
    NoResponse,

    #[error("Bus read timed out")]
    Timeout,

    #[error("Connection reset")]
    ConnectionReset,

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("I/O error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => TransportError::ConnectionReset,
            _ => TransportError::Io(err),
        }
    }
}

/// A register block could not be turned into a value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The bus returned nothing for this read.
    #[error("No register block returned")]
    NoResponse,

    /// Word count of the block does not match the descriptor.
    #[error("Malformed register block: expected {expected} words, got {actual}")]
    MalformedBlock { expected: usize, actual: usize },
}

/// Problems in the measurement descriptor source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DescriptorError {
    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Duplicate measurement name: {name}")]
    DuplicateName { name: String },

    #[error("Invalid value: {field} ({reason})")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors surfaced by the telemetry crate.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Decode failure: {0}")]
    Decode(#[from] DecodeFailure),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to read descriptor file: {path}")]
    DescriptorFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {what}")]
    InvalidConfig { what: &'static str },
}
