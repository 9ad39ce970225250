//! Application layer use cases for the client.

pub mod bridge_service;

pub use bridge_service::{BridgeError, ClipboardBridgeService};
