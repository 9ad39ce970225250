//! Ports between the application layer and its adapters.
//!
//! The application layer depends on these traits only.  Infrastructure
//! provides the real implementations (Telegram over HTTP, the websocket
//! session hub); tests provide recording fakes.

use async_trait::async_trait;
use clipbridge_core::{ClientId, ReplyMessage};
use thiserror::Error;

use super::telegram::{InlineKeyboardMarkup, UserId};

/// Outbound notifications to Telegram users.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Tells `user_id` that `client_id` sent `message`.
    ///
    /// Returns `false` when Telegram did not accept the notification.
    async fn notify_client_message(
        &self,
        user_id: UserId,
        client_id: &ClientId,
        message: &str,
    ) -> bool;

    /// Sends `message` to every known bot user; returns how many accepted it.
    async fn broadcast(&self, message: &str) -> usize;
}

/// Why a reply could not be delivered to a websocket client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The id is empty or the `"unknown"` sentinel.
    #[error("invalid client id: '{0}'")]
    InvalidClientId(ClientId),

    /// The session is known to have disconnected.
    #[error("client {0} has disconnected")]
    Disconnected(ClientId),

    /// No websocket session is attached for this id.
    #[error("no session for client {0}")]
    NoSession(ClientId),

    /// The session's outbound queue is closed (connection reset).
    #[error("connection to client {0} closed")]
    ConnectionClosed(ClientId),
}

/// Delivery of replies to websocket clients.
#[async_trait]
pub trait ClientMessenger: Send + Sync {
    async fn send_to_client(
        &self,
        client_id: &ClientId,
        reply: ReplyMessage,
    ) -> Result<(), DeliveryError>;
}

/// The slice of the Telegram Bot API the relay uses.
///
/// Send operations report success as a `bool`: failures are logged by the
/// adapter and the relay carries on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelegramBotApi: Send + Sync {
    async fn send_message(&self, chat_id: UserId, text: &str) -> bool;

    async fn send_message_with_markup(
        &self,
        chat_id: UserId,
        text: &str,
        markup: &InlineKeyboardMarkup,
    ) -> bool;

    /// Stops the loading indicator on an inline button.
    async fn answer_callback(&self, callback_id: &str) -> bool;

    /// Every user the bot knows about: the main user plus everyone who wrote.
    async fn bot_users(&self) -> Vec<UserId>;
}
