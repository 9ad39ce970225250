//! JSON codec for websocket frames.
//!
//! Every websocket text message carries exactly one frame.  Oversized input
//! is rejected before it reaches the JSON parser.

use thiserror::Error;

use super::frames::{ClientFrame, ServerFrame};

/// Largest frame, in bytes, either side will decode.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text is not a valid frame.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// The text exceeds [`MAX_FRAME_BYTES`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

fn check_size(text: &str) -> Result<(), ProtocolError> {
    if text.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge {
            size: text.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    Ok(())
}

/// Encodes a client frame as JSON text.
///
/// # Errors
///
/// Returns [`ProtocolError::FrameTooLarge`] when the encoded frame would be
/// refused by the server.
pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(frame)?;
    check_size(&text)?;
    Ok(text)
}

/// Decodes one client frame from JSON text.
///
/// # Examples
///
/// ```rust
/// use clipbridge_core::protocol::{decode_client_frame, ClientFrame};
///
/// let frame = decode_client_frame(r#"{"type":"Disconnect"}"#).unwrap();
/// assert_eq!(frame, ClientFrame::Disconnect);
/// ```
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, ProtocolError> {
    check_size(text)?;
    Ok(serde_json::from_str(text)?)
}

/// Encodes a server frame as JSON text.
pub fn encode_server_frame(frame: &ServerFrame) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(frame)?;
    check_size(&text)?;
    Ok(text)
}

/// Decodes one server frame from JSON text.
pub fn decode_server_frame(text: &str) -> Result<ServerFrame, ProtocolError> {
    check_size(text)?;
    Ok(serde_json::from_str(text)?)
}
