//! Frame envelopes exchanged over the websocket.
//!
//! Every frame is a JSON object with a `"type"` discriminant.  Client frames
//! address the server by destination string, the same way a message broker
//! addresses queues:
//!
//! ```text
//! client ── Subscribe{/user/queue/reply} ──► server
//! client ── Send{/app/sendMessage, body} ──► server ── Receipt ──► client
//!                                            server ── Message{/user/queue/reply} ──► client
//! ```
//!
//! Direction-specific enums make it a compile-time error to send a
//! server-only frame from the client.

use serde::{Deserialize, Serialize};

use super::messages::{CommandMessage, ReplyMessage};
use crate::domain::client_id::ClientId;

/// HTTP path on which the server accepts websocket upgrades.
pub const WS_PATH: &str = "/ws";

/// Destination that accepts [`CommandMessage`] bodies.
pub const SEND_MESSAGE_DESTINATION: &str = "/app/sendMessage";

/// Per-client destination on which Telegram replies are delivered.
pub const REPLY_DESTINATION: &str = "/user/queue/reply";

/// Frames a client sends to the server.
///
/// ```json
/// {"type":"Subscribe","destination":"/user/queue/reply"}
/// {"type":"Send","destination":"/app/sendMessage","body":{"command":"dm","content":"hi","targetUserId":1}}
/// {"type":"Disconnect"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Start receiving messages published to `destination`.
    Subscribe { destination: String },

    /// Deliver a command to a server-side handler.
    Send {
        destination: String,
        body: CommandMessage,
    },

    /// Graceful end of session.
    Disconnect,
}

/// Frames the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// First frame of every session; carries the id the server assigned.
    Connected { client_id: ClientId },

    /// A message published to a destination the client subscribed to.
    Message {
        destination: String,
        body: ReplyMessage,
    },

    /// Outcome of processing a `Send` frame.
    ///
    /// `accepted` is `false` when the command was rejected (missing target
    /// user, blank content, unknown command).
    Receipt { accepted: bool, response: String },

    /// The previous client frame could not be handled.
    Error { message: String },
}

impl ServerFrame {
    /// Returns a short static name for log output.
    pub fn type_name(&self) -> &'static str {
        match self {
            ServerFrame::Connected { .. } => "Connected",
            ServerFrame::Message { .. } => "Message",
            ServerFrame::Receipt { .. } => "Receipt",
            ServerFrame::Error { .. } => "Error",
        }
    }
}

impl ClientFrame {
    /// Returns a short static name for log output.
    pub fn type_name(&self) -> &'static str {
        match self {
            ClientFrame::Subscribe { .. } => "Subscribe",
            ClientFrame::Send { .. } => "Send",
            ClientFrame::Disconnect => "Disconnect",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_serializes_with_type_discriminant() {
        // Arrange
        let frame = ClientFrame::Subscribe {
            destination: REPLY_DESTINATION.to_string(),
        };

        // Act
        let json = serde_json::to_string(&frame).unwrap();

        // Assert
        assert_eq!(
            json,
            r#"{"type":"Subscribe","destination":"/user/queue/reply"}"#
        );
    }

    #[test]
    fn test_connected_frame_carries_plain_string_id() {
        // Arrange
        let frame = ServerFrame::Connected {
            client_id: ClientId::new("abc"),
        };

        // Act
        let json = serde_json::to_string(&frame).unwrap();

        // Assert
        assert_eq!(json, r#"{"type":"Connected","client_id":"abc"}"#);
    }

    #[test]
    fn test_disconnect_deserializes_from_bare_type() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"Disconnect"}"#).unwrap();
        assert_eq!(frame, ClientFrame::Disconnect);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result = serde_json::from_str::<ClientFrame>(r#"{"type":"Teleport"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_type_names_match_discriminants() {
        let frame = ServerFrame::Receipt {
            accepted: true,
            response: "ok".to_string(),
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(&format!(r#""type":"{}""#, frame.type_name())));
    }
}
