//! Infrastructure layer for the client.
//!
//! - **`clipboard`** – [`SystemClipboard`](clipboard::SystemClipboard) over
//!   `arboard` with command-line fallbacks.
//! - **`network`** – [`WsMessageService`](network::WsMessageService), the
//!   websocket transport.
//! - **`config`** – `client.toml` persistence and server URL normalisation.

pub mod clipboard;
pub mod config;
pub mod network;
