//! Application layer use cases for the relay server.
//!
//! Use cases in this layer depend on the ports in [`crate::domain::ports`]
//! and never touch sockets or HTTP directly.
//!
//! # Sub-modules
//!
//! - **`session_registry`** – Which websocket clients are active, which have
//!   disconnected and when.
//!
//! - **`lifecycle`** – Turns connect / subscribe / disconnect events into
//!   registry updates, dropping duplicate disconnects.
//!
//! - **`command_processor`** – Validates client commands and forwards their
//!   content to Telegram.
//!
//! - **`notifier`** – The Telegram half of the relay: notifications with a
//!   Reply button, and routing of Telegram replies back to clients.
//!
//! - **`update_dedup`** – Bounded memory of Telegram updates already handled.

pub mod command_processor;
pub mod lifecycle;
pub mod notifier;
pub mod session_registry;
pub mod update_dedup;

pub use command_processor::{CommandError, CommandProcessor, MessageProcessor};
pub use lifecycle::{DisconnectOutcome, SessionLifecycle};
pub use notifier::TelegramNotifier;
pub use session_registry::{SessionRegistry, SessionStats, SharedSessions};
