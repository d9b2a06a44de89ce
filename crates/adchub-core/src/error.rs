//! Error types for the protocol core.

use adchub_proto::ProtocolError;
use thiserror::Error;

/// Errors from identity verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The Tiger hash of the presented PID does not equal the presented CID.
    #[error("PID does not match CID")]
    Mismatch,

    /// The presented ID or PD field is not decodable Base32.
    #[error("identifier encoding: {0}")]
    Encoding(#[from] ProtocolError),
}
