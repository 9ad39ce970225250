//! Websocket wire protocol: message bodies, frame envelopes, and the JSON codec.

pub mod codec;
pub mod frames;
pub mod messages;

pub use codec::{
    decode_client_frame, decode_server_frame, encode_client_frame, encode_server_frame,
    ProtocolError, MAX_FRAME_BYTES,
};
pub use frames::{ClientFrame, ServerFrame, REPLY_DESTINATION, SEND_MESSAGE_DESTINATION, WS_PATH};
pub use messages::{CommandMessage, ReplyMessage, COMMAND_BROADCAST, COMMAND_DM};
