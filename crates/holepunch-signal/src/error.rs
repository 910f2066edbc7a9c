//! Signaling relay errors.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised by signaling connections and the endpoint
#[derive(Debug, Error)]
pub enum SignalError {
    /// Socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Connection was already closed
    #[error("Connection closed")]
    Closed,
}

/// Result alias for signaling operations.
pub type Result<T> = std::result::Result<T, SignalError>;
