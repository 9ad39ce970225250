//! Infrastructure layer: sockets and HTTP.
//!
//! # Sub-modules
//!
//! - **`ws_server`** – Websocket accept loop and per-session reader/writer.
//! - **`hub`** – Outbound frame queues per client; implements
//!   [`ClientMessenger`](crate::domain::ports::ClientMessenger).
//! - **`telegram`** – Bot API adapter and the `getUpdates` loop.
//! - **`rest`** – `POST /api/messages/send` on the same port.
//! - **`housekeeping`** – Periodic stats logging and session purging.

pub mod housekeeping;
pub mod hub;
pub mod rest;
pub mod telegram;
pub mod ws_server;

pub use housekeeping::run_housekeeping;
pub use hub::SessionHub;
pub use telegram::{run_polling, TelegramBotAdapter, TelegramError};
pub use ws_server::{run_server, serve, ServerContext};
