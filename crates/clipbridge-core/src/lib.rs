//! # clipbridge-core
//!
//! Shared library for the clipboard bridge containing the websocket wire
//! protocol and the client identity type.
//!
//! Both the relay server and the command-line client depend on this crate.
//! It has no dependencies on sockets, clipboards, or the Telegram API.
//!
//! # Architecture overview
//!
//! The clipboard bridge lets a desktop user push text (usually the clipboard)
//! to a Telegram user and get the Telegram user's answer back on the local
//! clipboard:
//!
//! ```text
//! clipbridge-client ──ws──► clipbridge-server ──Bot API──► Telegram user
//!         ▲                         │                            │
//!         └──────── reply ──────────┴────────── reply ◄──────────┘
//! ```
//!
//! - **`protocol`** – JSON frames exchanged over the websocket, addressed by
//!   destination strings (`/app/sendMessage`, `/user/queue/reply`).
//!
//! - **`domain`** – The [`ClientId`] assigned to each websocket connection.

pub mod domain;
pub mod protocol;

pub use domain::client_id::ClientId;
pub use protocol::codec::{
    decode_client_frame, decode_server_frame, encode_client_frame, encode_server_frame,
    ProtocolError,
};
pub use protocol::frames::{ClientFrame, ServerFrame};
pub use protocol::messages::{CommandMessage, ReplyMessage};
