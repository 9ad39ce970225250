//! Persistent client settings in `client.toml`.
//!
//! The file lives in the platform config directory:
//! - Windows:  `%APPDATA%\ClipboardBridge\client.toml`
//! - Linux:    `~/.config/clipboard-bridge/client.toml`
//! - macOS:    `~/Library/Application Support/ClipboardBridge/client.toml`
//!
//! ```toml
//! [server]
//! url = "ws://localhost:8080/ws"
//!
//! [messaging]
//! target_user_id = 123456789
//! timeout_secs = 30
//! ```
//!
//! Missing fields fall back to their defaults, so a first run works without
//! a file and older files keep loading after new fields are added.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clipbridge_core::protocol::WS_PATH;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server URL used until one is configured with `-s`.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080/ws";

/// Connection timeout used until one is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const CONFIG_FILE_NAME: &str = "client.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid server address: '{0}'")]
    InvalidServerUrl(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Everything the client persists between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub messaging: MessagingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Websocket URL of the relay, always ending in `/ws`.
    #[serde(default = "default_server_url")]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagingSection {
    /// Telegram user that receives the clipboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_user_id: Option<i64>,

    /// Connect / handshake timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

impl Default for MessagingSection {
    fn default() -> Self {
        Self {
            target_user_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.messaging.timeout_secs)
    }
}

// ── Server URL normalisation ──────────────────────────────────────────────────

/// Turns whatever the user typed after `-s` into a websocket URL.
///
/// - no scheme → `ws://` is prepended
/// - `http://` / `https://` → `ws://` / `wss://`
/// - `/ws` is appended when missing
///
/// # Errors
///
/// [`ConfigError::InvalidServerUrl`] for a blank host or a foreign scheme.
pub fn normalize_server_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let invalid = || ConfigError::InvalidServerUrl(raw.to_string());

    let (scheme, rest) = match trimmed.split_once("://") {
        Some(("http", rest)) => ("ws", rest),
        Some(("https", rest)) => ("wss", rest),
        Some((scheme @ ("ws" | "wss"), rest)) => (scheme, rest),
        Some(_) => return Err(invalid()),
        None => ("ws", trimmed),
    };

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() || rest.starts_with('/') {
        return Err(invalid());
    }

    if rest.ends_with(WS_PATH) {
        Ok(format!("{scheme}://{rest}"))
    } else {
        Ok(format!("{scheme}://{rest}{WS_PATH}"))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Full path of `client.toml` in the platform config directory.
///
/// # Errors
///
/// [`ConfigError::NoPlatformConfigDir`] when the base directory cannot be
/// determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config at `path`, returning defaults if the file does not exist.
pub fn load_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
pub fn save_to(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ClipboardBridge"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("clipboard-bridge"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ClipboardBridge")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
