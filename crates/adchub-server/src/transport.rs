//! TCP transport.
//!
//! ADC hubs speak plain line-oriented TCP; the transport layer is just a
//! bound listener handing accepted connections to the session runtime.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;

/// A bound TCP listener.
pub struct TcpTransport {
    /// The listening socket
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind a listener to the given address.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("TCP transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Accept a new connection.
    ///
    /// Blocks until a connection is available.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        self.listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }
}
