//! clipbridge-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The client reads the local clipboard (or a `-m` message), sends it to the
//! relay server over websocket, waits for the Telegram user's answer, and
//! puts that answer on the clipboard.

/// Ports: clipboard access, messaging, and the events the server produces.
pub mod domain;

/// Application layer: the send-and-wait-for-reply use case.
pub mod application;

/// Infrastructure layer: system clipboard, websocket transport, config file.
pub mod infrastructure;
