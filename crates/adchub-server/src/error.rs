//! Server error types.

use std::io;

use thiserror::Error;

/// Errors that can occur in the server runtime.
///
/// Per-session protocol problems never surface here - they become status
/// replies or disconnects inside the hub driver. This type covers the
/// failures that concern the process itself.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, etc.).
    ///
    /// Fatal; fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, accept failure, I/O error).
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats() {
        let err = ServerError::Config("bad address".to_string());
        assert_eq!(err.to_string(), "configuration error: bad address");

        let err = ServerError::Transport("refused".to_string());
        assert_eq!(err.to_string(), "transport error: refused");
    }
}
