//! Domain layer for the client: the ports the application depends on.

pub mod ports;

pub use ports::{ClientEvent, ClientNetworkError, ClipboardService, MessageService};
