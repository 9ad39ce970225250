//! clipbridge-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.

/// Configuration, Telegram Bot API types, and the ports between layers.
pub mod domain;
/// Session tracking, command processing, and the Telegram reply flow.
pub mod application;
/// Websocket endpoint, session hub, Telegram HTTP adapter, housekeeping.
pub mod infrastructure;
