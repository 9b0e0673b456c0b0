// ── Transport seam ──
//
// The wire-level session (websocket handshake, token auth, keepalive
// framing, binary state decoding) lives outside this crate. A transport
// reports upward only by enqueuing `ServerEvent`s through the
// `EventSender` it was built with; the supervisor drives it downward
// through this trait.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Identity;

/// Errors a transport may return from its downward operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is not connected")]
    NotConnected,

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Session to one Miniserver.
///
/// `send_command` may be called from any task while the supervisor is
/// running; implementations must tolerate concurrent writers.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the socket and start the handshake. Success means the socket
    /// is up; authentication completes asynchronously and is signalled by
    /// `ServerEvent::ConnectionEstablished` or `ConnectionLost`.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Close the session. Must be safe to call when already closed.
    async fn disconnect(&self);

    /// Send a textual command to the control with `control`'s identity.
    async fn send_command(&self, control: &Identity, command: &str) -> Result<(), TransportError>;

    /// Adjust the keepalive interval of the live session, if any.
    fn update_keep_alive_period(&self, period: Duration);
}
