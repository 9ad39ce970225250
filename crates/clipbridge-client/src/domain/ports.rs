//! Ports implemented by the infrastructure layer.

use std::time::Duration;

use async_trait::async_trait;
use clipbridge_core::{CommandMessage, ProtocolError, ReplyMessage};
use thiserror::Error;

/// Access to the system clipboard.
///
/// Failures are reported as `false` / `None`; implementations log the cause.
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardService: Send + Sync {
    /// Whether the clipboard can be read and written at all.
    fn is_available(&self) -> bool;

    /// Current clipboard text, if any.
    fn read(&self) -> Option<String>;

    /// Replaces the clipboard text.
    fn copy(&self, text: &str) -> bool;
}

/// Something the server told this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Outcome of a command this client sent.
    Receipt { accepted: bool, response: String },

    /// A Telegram reply routed to this client.
    Reply(ReplyMessage),

    /// The server could not handle a frame.
    Error(String),

    /// The connection ended.
    Closed,
}

/// Errors in the client network layer.
#[derive(Debug, Error)]
pub enum ClientNetworkError {
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("no answer from the server within {0:?}")]
    Timeout(Duration),

    #[error("unexpected handshake: {0}")]
    Handshake(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("websocket error: {0}")]
    WebSocket(String),

    #[error("connection closed by server")]
    Closed,
}

/// Command channel to the relay server.
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Opens the connection.  Does nothing when already connected.
    async fn connect(&self) -> Result<(), ClientNetworkError>;

    /// Sends a command, connecting first if needed.
    async fn send(&self, command: CommandMessage) -> Result<(), ClientNetworkError>;

    /// Waits for the next server event.  `None` once the connection is gone
    /// and every pending event has been drained.
    async fn next_event(&self) -> Option<ClientEvent>;

    /// Closes the connection.  Safe to call when not connected.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}
