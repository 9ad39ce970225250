//! Telegram Bot HTTP API adapter and the `getUpdates` long-poll loop.

pub mod adapter;
pub mod polling;

pub use adapter::{ApiResponse, TelegramBotAdapter, TelegramError};
pub use polling::run_polling;
