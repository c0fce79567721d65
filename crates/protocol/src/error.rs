//! Protocol error types

use thiserror::Error;

/// Wire-level protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Decoded buffer length does not match the schema size. On a stream
    /// this means the peer and the server have desynchronized.
    #[error("length mismatch for {schema}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        schema: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A record value does not fit the declared field width
    #[error("field {field} value {value:#x} does not fit in {width} bytes")]
    ValueOutOfRange {
        field: &'static str,
        value: u64,
        width: usize,
    },

    /// A decoded record is missing an expected field
    #[error("missing field {field} in {schema}")]
    MissingField {
        schema: &'static str,
        field: &'static str,
    },

    /// I/O error while reading or writing a message
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
