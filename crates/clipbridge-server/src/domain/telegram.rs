//! Subset of the Telegram Bot API object model used by the relay.
//!
//! Only the fields the relay reads are declared; serde ignores the rest, so
//! new fields added by Telegram do not break decoding.

use serde::{Deserialize, Serialize};

/// Telegram user id.  Private chats share the id of the user.
pub type UserId = i64;

/// Callback data prefix carried by the inline "Reply" button.
pub const REPLY_CALLBACK_PREFIX: &str = "reply:";

/// One incoming update from `getUpdates`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Press of an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// A keyboard with exactly one callback button.
    pub fn single_button(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            inline_keyboard: vec![vec![InlineKeyboardButton {
                text: text.into(),
                callback_data: Some(callback_data.into()),
            }]],
        }
    }
}

impl Update {
    /// The user who caused this update, if any.
    pub fn sender(&self) -> Option<&User> {
        if let Some(message) = &self.message {
            return message.from.as_ref();
        }
        self.callback_query.as_ref().map(|query| &query.from)
    }

    /// Key used to drop updates that Telegram delivers more than once.
    ///
    /// Messages are keyed `msg_<chat_id>_<message_id>` (message ids are only
    /// unique within a chat), callback queries `cbq_<callback_id>`.  Other
    /// update kinds have no key.
    pub fn dedup_key(&self) -> Option<String> {
        if let Some(message) = &self.message {
            return Some(format!("msg_{}_{}", message.chat.id, message.message_id));
        }
        self.callback_query
            .as_ref()
            .map(|query| format!("cbq_{}", query.id))
    }
}
