//! Message bodies carried inside websocket frames.
//!
//! Field names are serialized in camelCase (`targetUserId`) so the JSON
//! stays readable from non-Rust tooling that talks to the relay.

use serde::{Deserialize, Serialize};

/// Command name that forwards `content` to a single Telegram user.
pub const COMMAND_DM: &str = "dm";

/// Command name that forwards `content` to every known Telegram user.
pub const COMMAND_BROADCAST: &str = "broadcast";

/// A command sent by a client to the relay server.
///
/// # Serde representation
///
/// ```json
/// {"command":"dm","option":"-m","content":"hello","targetUserId":123456789}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    /// Command name, e.g. [`COMMAND_DM`] or [`COMMAND_BROADCAST`].
    #[serde(default)]
    pub command: Option<String>,

    /// Free-form `|`-separated options.  The server appends `client=<id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,

    /// Text payload, usually the sender's clipboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Telegram user id that should receive the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<i64>,
}

impl CommandMessage {
    /// Builds a direct-message command addressed to one Telegram user.
    pub fn direct(content: impl Into<String>, target_user_id: i64) -> Self {
        Self {
            command: Some(COMMAND_DM.to_string()),
            option: Some("-m".to_string()),
            content: Some(content.into()),
            target_user_id: Some(target_user_id),
        }
    }
}

/// A reply routed from the relay server to one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyMessage {
    /// Reply text.  For Telegram replies this is what lands on the clipboard.
    pub response: String,
}

impl ReplyMessage {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}
