//! [`TelegramBotApi`] implementation over the Telegram Bot HTTP API.
//!
//! Every method is a JSON `POST` to `<api_url>/bot<token>/<method>`.  The
//! response envelope is [`ApiResponse`]; `ok: false` becomes
//! [`TelegramError::Api`].

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::config::TelegramConfig;
use crate::domain::ports::TelegramBotApi;
use crate::domain::telegram::{InlineKeyboardMarkup, Message, Update, User, UserId};

/// Extra time the HTTP client allows on top of the long-poll timeout.
const HTTP_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Update kinds the relay asks Telegram for.
const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

/// Errors talking to the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Transport failure.  The URL is stripped because it contains the token.
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Bot API response has no result")]
    MissingResult,
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.without_url())
    }
}

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TelegramError> {
        if !self.ok {
            return Err(TelegramError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
            });
        }
        self.result.ok_or(TelegramError::MissingResult)
    }
}

#[derive(Serialize)]
struct SendMessageParams<'a> {
    chat_id: UserId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Serialize)]
struct AnswerCallbackParams<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct GetUpdatesParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct NoParams {}

/// HTTP client for one bot.
pub struct TelegramBotAdapter {
    http: reqwest::Client,
    base_url: String,
    bot_username: String,
    poll_timeout: Duration,
    users: Mutex<BTreeSet<UserId>>,
}

impl TelegramBotAdapter {
    /// Builds the HTTP client.  The main user is a bot user from the start.
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(config.poll_timeout + HTTP_TIMEOUT_MARGIN)
            .build()?;

        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            bot_username: config.bot_username.clone(),
            poll_timeout: config.poll_timeout,
            users: Mutex::new(BTreeSet::from([config.main_user_id])),
        })
    }

    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("Bot API call {method}");
        let response: ApiResponse<R> = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(params)
            .send()
            .await?
            .json()
            .await?;
        response.into_result()
    }

    /// Returns the bot's own account.  Used as a startup credential check.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &NoParams {}).await
    }

    /// Long-polls for updates after `offset`.
    ///
    /// The sender of every returned update becomes a bot user.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdatesParams {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: ALLOWED_UPDATES,
        };
        let updates: Vec<Update> = self.call("getUpdates", &params).await?;
        for update in &updates {
            self.remember_sender(update).await;
        }
        Ok(updates)
    }

    /// Adds the sender of `update` to the bot users.
    pub async fn remember_sender(&self, update: &Update) {
        if let Some(user) = update.sender() {
            if self.users.lock().await.insert(user.id) {
                debug!("new bot user {}", user.id);
            }
        }
    }

    async fn post_message(&self, params: SendMessageParams<'_>) -> bool {
        let chat_id = params.chat_id;
        match self.call::<_, Message>("sendMessage", &params).await {
            Ok(_) => true,
            Err(e) => {
                warn!("sendMessage to {chat_id} failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl TelegramBotApi for TelegramBotAdapter {
    async fn send_message(&self, chat_id: UserId, text: &str) -> bool {
        self.post_message(SendMessageParams {
            chat_id,
            text,
            reply_markup: None,
        })
        .await
    }

    async fn send_message_with_markup(
        &self,
        chat_id: UserId,
        text: &str,
        markup: &InlineKeyboardMarkup,
    ) -> bool {
        self.post_message(SendMessageParams {
            chat_id,
            text,
            reply_markup: Some(markup),
        })
        .await
    }

    async fn answer_callback(&self, callback_id: &str) -> bool {
        let params = AnswerCallbackParams {
            callback_query_id: callback_id,
        };
        match self.call::<_, bool>("answerCallbackQuery", &params).await {
            Ok(answered) => answered,
            Err(e) => {
                warn!("answerCallbackQuery {callback_id} failed: {e}");
                false
            }
        }
    }

    async fn bot_users(&self) -> Vec<UserId> {
        self.users.lock().await.iter().copied().collect()
    }
}
