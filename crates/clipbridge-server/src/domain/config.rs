//! Runtime configuration for the relay server.

use std::net::SocketAddr;
use std::time::Duration;

use clipbridge_core::protocol::WS_PATH;

/// Public Telegram Bot API endpoint.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Credentials and polling behaviour for the Telegram bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather.
    pub bot_token: String,

    /// Bot username, used only in log output.
    pub bot_username: String,

    /// Telegram user that is always a bot user, even before it writes to the bot.
    pub main_user_id: i64,

    /// Base URL of the Bot API.  Overridden in tests.
    pub api_url: String,

    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout: Duration,
}

/// Validated runtime configuration for the relay server.
///
/// Constructed from CLI arguments in `main.rs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address on which the websocket endpoint listens.
    pub bind_addr: SocketAddr,

    pub telegram: TelegramConfig,

    /// How often the housekeeping task logs stats and purges stale sessions.
    pub housekeeping_interval: Duration,

    /// How long a disconnected session is remembered before it is purged.
    pub disconnected_retention: Duration,
}

impl ServerConfig {
    /// URL a client on this machine would connect to, for log output.
    pub fn local_ws_url(&self) -> String {
        format!("ws://{}{}", self.bind_addr, WS_PATH)
    }
}
