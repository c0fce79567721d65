//! Device model error types

use protocol::ProtocolError;
use thiserror::Error;

/// Descriptor lookup and encode failures.
///
/// These are reported to the control dispatcher, which answers the host
/// with a negative status instead of dereferencing absent data.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("string descriptor index {index} is not registered")]
    StringIndex { index: u8 },

    #[error("configuration index {index} is out of range")]
    ConfigurationIndex { index: u8 },

    #[error("descriptor type {descriptor_type:#04x} is not available")]
    UnsupportedType { descriptor_type: u8 },

    #[error(transparent)]
    Wire(#[from] ProtocolError),
}

/// Type alias for device model results
pub type Result<T> = std::result::Result<T, DescriptorError>;
