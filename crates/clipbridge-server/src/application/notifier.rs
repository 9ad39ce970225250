//! Telegram side of the relay.
//!
//! [`TelegramNotifier`] turns client messages into Telegram notifications
//! and turns Telegram replies back into [`ReplyMessage`]s for the client.
//!
//! # Reply flow
//!
//! ```text
//! client ── dm ──► notify_client_message ──► "Message from client (id)" [Reply]
//!                                                         │ button press
//!                                    callback "reply:<id>" ▼
//!                                   pending reply: user ─► client id
//!                                                         │ next text message
//!                        ClientMessenger::send_to_client ◄┘
//! ```
//!
//! The "Reply" button is offered only while the client's session is active.
//! Text that is not an awaited reply is ignored; the bot has no slash
//! commands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clipbridge_core::{ClientId, ReplyMessage};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::session_registry::SharedSessions;
use super::update_dedup::ProcessedUpdates;
use crate::domain::ports::{ClientMessenger, NotificationService, TelegramBotApi};
use crate::domain::telegram::{
    CallbackQuery, InlineKeyboardMarkup, Update, UserId, REPLY_CALLBACK_PREFIX,
};

pub const PROMPT_REPLY: &str = "🔄 Type your reply for the client:";
pub const REPLY_DELIVERED: &str = "✅ Your reply was sent to the client!";
pub const REPLY_FAILED: &str = "❌ Could not deliver the reply to the client. Try again later.";
pub const CANNOT_REPLY_UNKNOWN: &str = "⚠️ Cannot reply: unknown recipient";
pub const CANNOT_REPLY_DISCONNECTED: &str = "⚠️ Cannot reply: the client has disconnected";
pub const WARN_CLIENT_INACTIVE: &str =
    "⚠️ Warning: the client may be inactive, the reply may not arrive";

/// Label of the inline button attached to notifications.
pub const REPLY_BUTTON_TEXT: &str = "Reply";

/// Session state of a client at the moment a notification is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Unknown id, or the session has ended `since` ago.
    Disconnected { since: Option<Duration> },
    /// Registered but not currently active.
    Inactive,
    Active,
}

/// Formats time since a disconnect: ` 12 sec ago`, ` 5 min ago`, ` 1.5 h ago`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!(" {secs} sec ago")
    } else if secs < 3600 {
        format!(" {} min ago", secs / 60)
    } else {
        format!(" {:.1} h ago", elapsed.as_secs_f64() / 3600.0)
    }
}

/// Builds the notification text shown to the Telegram user.
pub fn compose_notification(client_id: &ClientId, message: &str, status: ClientStatus) -> String {
    match status {
        ClientStatus::Disconnected { since } => {
            let age = since.map(format_elapsed).unwrap_or_default();
            format!(
                "Message from client (DISCONNECTED{age}):\n---\n{message}\n\n\
                 ⚠️ The client disconnected, replying is not possible."
            )
        }
        ClientStatus::Inactive => format!(
            "Message from client (INACTIVE):\n---\n{message}\n\n\
             ⚠️ The client is inactive, the reply may not arrive."
        ),
        ClientStatus::Active => format!("Message from client ({client_id}):\n---\n{message}"),
    }
}

#[derive(Debug, Default)]
struct ReplyState {
    /// Telegram user → client they pressed "Reply" for.
    pending_replies: HashMap<UserId, ClientId>,
    processed: ProcessedUpdates,
}

/// Coordinates the Telegram bot and the websocket clients.
pub struct TelegramNotifier {
    bot: Arc<dyn TelegramBotApi>,
    sessions: SharedSessions,
    messenger: Arc<dyn ClientMessenger>,
    state: Mutex<ReplyState>,
}

impl TelegramNotifier {
    pub fn new(
        bot: Arc<dyn TelegramBotApi>,
        sessions: SharedSessions,
        messenger: Arc<dyn ClientMessenger>,
    ) -> Self {
        Self {
            bot,
            sessions,
            messenger,
            state: Mutex::new(ReplyState::default()),
        }
    }

    /// Handles one update received from Telegram.
    ///
    /// Updates seen before (same message id or callback id) are dropped.
    pub async fn handle_update(&self, update: &Update) {
        if let Some(key) = update.dedup_key() {
            let mut state = self.state.lock().await;
            if !state.processed.insert(key.clone()) {
                debug!("skipping duplicate update {key}");
                return;
            }
        }

        if let Some(message) = &update.message {
            match (&message.from, &message.text) {
                (Some(from), Some(text)) => self.handle_text(from.id, text).await,
                _ => debug!(
                    "ignoring message {} without sender or text",
                    message.message_id
                ),
            }
        } else if let Some(query) = &update.callback_query {
            self.handle_callback(query).await;
        }
    }

    /// The client `user_id` is currently replying to, if any.
    pub async fn pending_reply_of(&self, user_id: UserId) -> Option<ClientId> {
        self.state.lock().await.pending_replies.get(&user_id).cloned()
    }

    /// Sends a plain text message, logging the outcome.
    pub async fn send_notification(&self, user_id: UserId, text: &str) -> bool {
        let sent = self.bot.send_message(user_id, text).await;
        if sent {
            debug!("notification delivered to Telegram user {user_id}");
        } else {
            warn!("failed to deliver notification to Telegram user {user_id}");
        }
        sent
    }

    async fn handle_text(&self, user_id: UserId, text: &str) {
        let pending = self.state.lock().await.pending_replies.remove(&user_id);
        let Some(client_id) = pending else {
            debug!("text from Telegram user {user_id} is not an awaited reply; ignored");
            return;
        };

        match self
            .messenger
            .send_to_client(&client_id, ReplyMessage::new(text))
            .await
        {
            Ok(()) => {
                info!("reply from Telegram user {user_id} delivered to client {client_id}");
                self.send_notification(user_id, REPLY_DELIVERED).await;
            }
            Err(e) => {
                error!("reply from Telegram user {user_id} not delivered: {e}");
                self.send_notification(user_id, REPLY_FAILED).await;
            }
        }
    }

    async fn handle_callback(&self, query: &CallbackQuery) {
        if !self.bot.answer_callback(&query.id).await {
            debug!("could not answer callback query {}", query.id);
        }

        let user_id = query.from.id;
        let Some(raw_id) = query
            .data
            .as_deref()
            .and_then(|data| data.strip_prefix(REPLY_CALLBACK_PREFIX))
        else {
            debug!("ignoring callback query {} with unrelated data", query.id);
            return;
        };
        let client_id = ClientId::new(raw_id);

        if !client_id.is_known() {
            self.send_notification(user_id, CANNOT_REPLY_UNKNOWN).await;
            return;
        }

        match self.client_status(&client_id).await {
            ClientStatus::Disconnected { .. } => {
                self.send_notification(user_id, CANNOT_REPLY_DISCONNECTED).await;
                return;
            }
            ClientStatus::Inactive => {
                self.send_notification(user_id, WARN_CLIENT_INACTIVE).await;
            }
            ClientStatus::Active => {}
        }

        self.state
            .lock()
            .await
            .pending_replies
            .insert(user_id, client_id.clone());
        debug!("Telegram user {user_id} is replying to client {client_id}");
        self.send_notification(user_id, PROMPT_REPLY).await;
    }

    async fn client_status(&self, client_id: &ClientId) -> ClientStatus {
        if !client_id.is_known() {
            return ClientStatus::Disconnected { since: None };
        }
        let sessions = self.sessions.lock().await;
        if sessions.is_disconnected(client_id) {
            ClientStatus::Disconnected {
                since: sessions
                    .last_disconnect_time(client_id)
                    .map(|at| at.elapsed()),
            }
        } else if sessions.is_active(client_id) {
            ClientStatus::Active
        } else {
            ClientStatus::Inactive
        }
    }
}

#[async_trait]
impl NotificationService for TelegramNotifier {
    async fn notify_client_message(
        &self,
        user_id: UserId,
        client_id: &ClientId,
        message: &str,
    ) -> bool {
        let client_id = client_id.clone().or_unknown();
        let status = self.client_status(&client_id).await;
        let text = compose_notification(&client_id, message, status);

        let sent = if status == ClientStatus::Active {
            let markup = InlineKeyboardMarkup::single_button(
                REPLY_BUTTON_TEXT,
                format!("{REPLY_CALLBACK_PREFIX}{client_id}"),
            );
            self.bot
                .send_message_with_markup(user_id, &text, &markup)
                .await
        } else {
            self.bot.send_message(user_id, &text).await
        };

        if sent {
            info!("notified Telegram user {user_id} about message from client {client_id}");
        } else {
            error!("could not notify Telegram user {user_id} about message from client {client_id}");
        }
        sent
    }

    async fn broadcast(&self, message: &str) -> usize {
        let users = self.bot.bot_users().await;
        let mut delivered = 0;
        for user_id in &users {
            if self.bot.send_message(*user_id, message).await {
                delivered += 1;
            }
        }
        info!("broadcast delivered to {delivered}/{} users", users.len());
        delivered
    }
}
