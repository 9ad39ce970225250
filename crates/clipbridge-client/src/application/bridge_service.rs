//! ClipboardBridgeService: send text to a Telegram user and put the answer
//! on the clipboard.
//!
//! The service sits between the clipboard port and the messaging port.  It
//! does not know about websockets or the clipboard backend in use.

use std::sync::Arc;

use clipbridge_core::{CommandMessage, ReplyMessage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::ports::{ClientEvent, ClientNetworkError, ClipboardService, MessageService};

/// Reasons a clipboard exchange fails.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no target Telegram user id, use -p <user_id> to set one")]
    NoTargetUser,

    #[error("clipboard is not available")]
    ClipboardUnavailable,

    #[error("clipboard is empty")]
    ClipboardEmpty,

    #[error("message is empty")]
    EmptyMessage,

    #[error(transparent)]
    Network(#[from] ClientNetworkError),

    #[error("server rejected the message: {0}")]
    Rejected(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    #[error("received an empty reply")]
    EmptyReply,

    #[error("could not copy the reply to the clipboard")]
    CopyFailed,
}

/// Coordinates the clipboard and the relay connection.
pub struct ClipboardBridgeService {
    clipboard: Arc<dyn ClipboardService>,
    messages: Arc<dyn MessageService>,
    target_user_id: Option<i64>,
}

impl ClipboardBridgeService {
    pub fn new(
        clipboard: Arc<dyn ClipboardService>,
        messages: Arc<dyn MessageService>,
        target_user_id: Option<i64>,
    ) -> Self {
        Self {
            clipboard,
            messages,
            target_user_id,
        }
    }

    /// Current clipboard text, rejecting an unavailable or blank clipboard.
    pub fn clipboard_content(&self) -> Result<String, BridgeError> {
        if !self.clipboard.is_available() {
            warn!("clipboard unavailable while reading");
            return Err(BridgeError::ClipboardUnavailable);
        }
        match self.clipboard.read() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => {
                warn!("clipboard is empty");
                Err(BridgeError::ClipboardEmpty)
            }
        }
    }

    /// Sends `text` as a direct message to the configured Telegram user.
    pub async fn send_text(&self, text: &str) -> Result<(), BridgeError> {
        let target = self.target_user_id.ok_or(BridgeError::NoTargetUser)?;
        if text.trim().is_empty() {
            return Err(BridgeError::EmptyMessage);
        }

        self.messages
            .send(CommandMessage::direct(text, target))
            .await?;
        info!("sent {} characters to Telegram user {target}", text.chars().count());
        Ok(())
    }

    /// Waits until the server delivers a reply.
    ///
    /// An accepted receipt keeps waiting; a rejected receipt, a server error
    /// or a closed connection ends the wait with an error.
    pub async fn await_reply(&self) -> Result<ReplyMessage, BridgeError> {
        loop {
            match self.messages.next_event().await {
                Some(ClientEvent::Receipt {
                    accepted: true,
                    response,
                }) => info!("server: {response}"),
                Some(ClientEvent::Receipt {
                    accepted: false,
                    response,
                }) => return Err(BridgeError::Rejected(response)),
                Some(ClientEvent::Reply(reply)) => {
                    debug!("reply received ({} bytes)", reply.response.len());
                    return Ok(reply);
                }
                Some(ClientEvent::Error(message)) => return Err(BridgeError::Server(message)),
                Some(ClientEvent::Closed) | None => return Err(BridgeError::ConnectionClosed),
            }
        }
    }

    /// Copies a non-blank reply to the clipboard.
    pub fn receive_reply(&self, text: &str) -> Result<(), BridgeError> {
        if text.trim().is_empty() {
            warn!("received an empty reply");
            return Err(BridgeError::EmptyReply);
        }
        if !self.clipboard.is_available() {
            return Err(BridgeError::ClipboardUnavailable);
        }
        if !self.clipboard.copy(text) {
            return Err(BridgeError::CopyFailed);
        }
        Ok(())
    }

    /// Full round trip: send `message` (or the clipboard when `None`), wait
    /// for the reply and copy it.  The connection is always closed.
    ///
    /// Returns the reply text that was copied.
    pub async fn exchange(&self, message: Option<String>) -> Result<String, BridgeError> {
        let outcome = self.exchange_inner(message).await;
        self.disconnect().await;
        outcome
    }

    async fn exchange_inner(&self, message: Option<String>) -> Result<String, BridgeError> {
        if self.target_user_id.is_none() {
            return Err(BridgeError::NoTargetUser);
        }
        let text = match message {
            Some(text) => text,
            None => self.clipboard_content()?,
        };
        self.send_text(&text).await?;
        let reply = self.await_reply().await?;
        self.receive_reply(&reply.response)?;
        Ok(reply.response)
    }

    pub async fn disconnect(&self) {
        self.messages.disconnect().await;
    }
}
