//! Error types for the ADC wire codec.

use thiserror::Error;

/// Convenience alias used throughout the codec.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while parsing or building ADC wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Line is shorter than the minimal `<prefix><CMD> ` frame.
    #[error("line too short: {len} bytes")]
    LineTooShort {
        /// Length of the offending line in bytes
        len: usize,
    },

    /// First character is not a known addressing prefix.
    #[error("invalid message prefix: {0:?}")]
    InvalidPrefix(char),

    /// Command is not three uppercase ASCII letters.
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),

    /// Byte 4 of the line is not the separator space.
    #[error("missing separator after command")]
    MissingSeparator,

    /// A `\` escape was followed by something other than `s`, `n` or `\`.
    #[error("malformed escape at byte {at}")]
    MalformedEscape {
        /// Byte offset of the backslash
        at: usize,
    },

    /// Base32 decoding failed even after padding repair.
    #[error("base32 decode error: {0}")]
    Base32(#[from] data_encoding::DecodeError),

    /// SID is not four characters from the Base32 alphabet.
    #[error("invalid SID: {0:?}")]
    InvalidSid(String),
}
