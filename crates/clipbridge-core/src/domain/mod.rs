//! Domain types shared by the server and the client.

pub mod client_id;

pub use client_id::{client_id_from_option, tag_option_with_client, ClientId};
