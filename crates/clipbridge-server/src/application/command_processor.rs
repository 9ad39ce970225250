//! Processing of commands received from websocket clients.
//!
//! A client sends a [`CommandMessage`]; the processor validates it and hands
//! the content to the [`NotificationService`].  The returned [`ReplyMessage`]
//! (or [`CommandError`]) becomes the `Receipt` frame sent back to the client.
//!
//! # Commands
//!
//! | Command     | Effect                                                   |
//! |-------------|----------------------------------------------------------|
//! | `dm`        | Notify `targetUserId` about the content, with a Reply button |
//! | `broadcast` | Send the content to every known bot user                 |

use std::sync::Arc;

use async_trait::async_trait;
use clipbridge_core::domain::client_id_from_option;
use clipbridge_core::protocol::{COMMAND_BROADCAST, COMMAND_DM};
use clipbridge_core::{ClientId, CommandMessage, ReplyMessage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::ports::NotificationService;

/// Reasons a command is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    EmptyCommand,

    #[error("target Telegram user id is missing")]
    MissingTargetUser,

    #[error("message content for '{command}' is empty")]
    EmptyContent { command: String },

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("failed to notify Telegram user {0}")]
    NotificationFailed(i64),
}

/// Port through which the websocket layer submits client commands.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Processes one command.
    ///
    /// `connection_id` is the id of the websocket session the command arrived
    /// on, when known; otherwise the id is recovered from the `option` field.
    async fn process(
        &self,
        command: CommandMessage,
        connection_id: Option<&ClientId>,
    ) -> Result<ReplyMessage, CommandError>;
}

/// Default [`MessageProcessor`] that forwards to Telegram.
pub struct CommandProcessor {
    notifications: Arc<dyn NotificationService>,
}

impl CommandProcessor {
    pub fn new(notifications: Arc<dyn NotificationService>) -> Self {
        Self { notifications }
    }
}

/// Picks the id a command is attributed to.
fn resolve_client_id(command: &CommandMessage, connection_id: Option<&ClientId>) -> ClientId {
    if let Some(id) = connection_id.filter(|id| id.is_known()) {
        return id.clone();
    }
    command
        .option
        .as_deref()
        .and_then(client_id_from_option)
        .unwrap_or_else(ClientId::unknown)
}

/// Returns the content when it has at least one non-whitespace character.
fn non_blank(content: Option<&str>) -> Option<&str> {
    content.filter(|text| !text.trim().is_empty())
}

#[async_trait]
impl MessageProcessor for CommandProcessor {
    async fn process(
        &self,
        command: CommandMessage,
        connection_id: Option<&ClientId>,
    ) -> Result<ReplyMessage, CommandError> {
        let name = command
            .command
            .as_deref()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .ok_or(CommandError::EmptyCommand)?;

        let client_id = resolve_client_id(&command, connection_id);
        debug!("processing '{name}' from client {client_id}");

        let target = command.target_user_id.ok_or_else(|| {
            warn!("command '{name}' from client {client_id} has no target user");
            CommandError::MissingTargetUser
        })?;

        match name.as_str() {
            COMMAND_DM => {
                let content = non_blank(command.content.as_deref()).ok_or_else(|| {
                    CommandError::EmptyContent {
                        command: name.clone(),
                    }
                })?;
                if !self
                    .notifications
                    .notify_client_message(target, &client_id, content)
                    .await
                {
                    return Err(CommandError::NotificationFailed(target));
                }
                info!("forwarded message from client {client_id} to Telegram user {target}");
                Ok(ReplyMessage::new("Message sent to the specified Telegram user"))
            }
            COMMAND_BROADCAST => {
                let content = non_blank(command.content.as_deref()).ok_or_else(|| {
                    CommandError::EmptyContent {
                        command: name.clone(),
                    }
                })?;
                let recipients = self.notifications.broadcast(content).await;
                info!("broadcast from client {client_id} reached {recipients} recipients");
                Ok(ReplyMessage::new(format!(
                    "Broadcast sent to {recipients} recipients"
                )))
            }
            _ => Err(CommandError::UnknownCommand(name)),
        }
    }
}
