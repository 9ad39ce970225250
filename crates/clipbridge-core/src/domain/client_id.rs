//! Identity of a websocket client session.
//!
//! The server hands every accepted connection a fresh UUID v4 string.  Replies
//! from Telegram are routed back by this id, and the id also travels inside
//! the command `option` field as `client=<id>` so it survives in places where
//! only the message text is available.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel used when a message cannot be attributed to a connection.
const UNKNOWN: &str = "unknown";

/// Key prefix inside a command `option` string that carries the client id.
const OPTION_CLIENT_PREFIX: &str = "client=";

/// Separator between entries of a command `option` string.
const OPTION_SEPARATOR: char = '|';

/// Identifier of one websocket client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Creates an id from any string, without validation.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh random id for a newly accepted connection.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The `"unknown"` sentinel.
    pub fn unknown() -> Self {
        Self(UNKNOWN.to_string())
    }

    /// Returns `false` for the empty string and for the `"unknown"` sentinel.
    pub fn is_known(&self) -> bool {
        !self.0.is_empty() && self.0 != UNKNOWN
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalises an empty id to the `"unknown"` sentinel.
    pub fn or_unknown(self) -> Self {
        if self.0.is_empty() {
            Self::unknown()
        } else {
            self
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Extracts the client id embedded in a command `option` string.
///
/// The option is a `|`-separated list; the first entry starting with
/// `client=` wins.  Returns `None` when no such entry exists or its value is
/// empty.
///
/// # Examples
///
/// ```rust
/// use clipbridge_core::domain::client_id::client_id_from_option;
///
/// let id = client_id_from_option("-m|client=abc").unwrap();
/// assert_eq!(id.as_str(), "abc");
/// assert!(client_id_from_option("-m").is_none());
/// ```
pub fn client_id_from_option(option: &str) -> Option<ClientId> {
    option
        .split(OPTION_SEPARATOR)
        .find_map(|part| part.strip_prefix(OPTION_CLIENT_PREFIX))
        .filter(|value| !value.is_empty())
        .map(ClientId::new)
}

/// Appends `client=<id>` to a command `option` string.
///
/// An absent or empty option becomes just `client=<id>`.
pub fn tag_option_with_client(option: Option<&str>, client_id: &ClientId) -> String {
    match option {
        Some(existing) if !existing.is_empty() => {
            format!("{existing}{OPTION_SEPARATOR}{OPTION_CLIENT_PREFIX}{client_id}")
        }
        _ => format!("{OPTION_CLIENT_PREFIX}{client_id}"),
    }
}
