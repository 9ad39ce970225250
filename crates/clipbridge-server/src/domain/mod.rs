//! Domain layer for the relay server.
//!
//! Contains plain data and trait definitions only: no sockets, no HTTP.

pub mod config;
pub mod ports;
pub mod telegram;

pub use config::{ServerConfig, TelegramConfig};
pub use ports::{ClientMessenger, DeliveryError, NotificationService, TelegramBotApi};
pub use telegram::{
    CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update, User, UserId,
};
