//! Clipboard bridge client: entry point.
//!
//! Sends the clipboard (or `-m <text>`) to a Telegram user through the relay
//! server, waits for the answer and puts it on the clipboard.
//!
//! # Usage
//!
//! ```text
//! clipbridge-client [OPTIONS]
//!
//! Options:
//!   -s, --server <URL>     Relay address; saved for later runs (alias: --ip)
//!   -p, --user <ID>        Target Telegram user id; saved for later runs
//!   -m, --message <TEXT>   Send this text instead of the clipboard
//!       --timeout <SECS>   Connect timeout for this run
//!       --config <PATH>    Use this file instead of the default client.toml
//! ```
//!
//! Exit code 0 means a reply arrived and was copied; anything else is 1.
//! Logs go to stderr, the copied reply to stdout.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clipbridge_client::application::ClipboardBridgeService;
use clipbridge_client::infrastructure::clipboard::SystemClipboard;
use clipbridge_client::infrastructure::config::{
    config_file_path, load_from, normalize_server_url, save_to, ClientConfig,
};
use clipbridge_client::infrastructure::network::WsMessageService;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Clipboard bridge client.
#[derive(Debug, Parser)]
#[command(
    name = "clipbridge-client",
    about = "Send the clipboard to Telegram and copy the reply back",
    version
)]
struct Cli {
    /// Relay server address, e.g. `192.168.1.5:8080` or `https://relay.example.com`.
    #[arg(short = 's', long = "server", visible_alias = "ip")]
    server: Option<String>,

    /// Telegram user id that receives the text.
    #[arg(short = 'p', long = "user")]
    user: Option<i64>,

    /// Text to send instead of the clipboard content.
    #[arg(short = 'm', long = "message")]
    message: Option<String>,

    /// Connect timeout in seconds for this run.
    #[arg(long)]
    timeout: Option<u64>,

    /// Config file location.
    #[arg(long, env = "CLIPBRIDGE_CLIENT_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Writes `-s` / `-p` into `config`.  Returns `true` if anything changed.
    fn apply_to(&self, config: &mut ClientConfig) -> anyhow::Result<bool> {
        let mut changed = false;
        if let Some(server) = &self.server {
            let url = normalize_server_url(server)?;
            if config.server.url != url {
                info!("server URL set to {url}");
                config.server.url = url;
                changed = true;
            }
        }
        if let Some(user) = self.user {
            if config.messaging.target_user_id != Some(user) {
                info!("target Telegram user set to {user}");
                config.messaging.target_user_id = Some(user);
                changed = true;
            }
        }
        Ok(changed)
    }

    fn connect_timeout(&self, config: &ClientConfig) -> Duration {
        self.timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.timeout())
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_file_path()?,
    };
    let mut config = load_from(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if cli.apply_to(&mut config)? {
        save_to(&config_path, &config)
            .with_context(|| format!("failed to save {}", config_path.display()))?;
        info!("settings saved to {}", config_path.display());
    }

    let messages = Arc::new(WsMessageService::new(
        config.server.url.clone(),
        cli.connect_timeout(&config),
    ));
    let bridge = ClipboardBridgeService::new(
        Arc::new(SystemClipboard::new()),
        messages,
        config.messaging.target_user_id,
    );

    info!("sending to {}", config.server.url);
    let outcome = tokio::select! {
        outcome = bridge.exchange(cli.message) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; closing connection");
            bridge.disconnect().await;
            return Ok(ExitCode::FAILURE);
        }
    };

    match outcome {
        Ok(reply) => {
            info!("reply copied to the clipboard");
            println!("{reply}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_short_flags() {
        // Arrange / Act
        let cli = Cli::parse_from([
            "clipbridge-client",
            "-s",
            "relay:8080",
            "-p",
            "42",
            "-m",
            "hi",
        ]);

        // Assert
        assert_eq!(cli.server.as_deref(), Some("relay:8080"));
        assert_eq!(cli.user, Some(42));
        assert_eq!(cli.message.as_deref(), Some("hi"));
    }

    #[test]
    fn test_cli_accepts_ip_alias() {
        let cli = Cli::parse_from(["clipbridge-client", "--ip", "10.0.0.2"]);
        assert_eq!(cli.server.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn test_cli_rejects_non_numeric_user() {
        tokio_test::assert_err!(Cli::try_parse_from(["clipbridge-client", "-p", "bob"]));
    }

    #[test]
    fn test_apply_to_normalizes_and_reports_change() {
        // Arrange
        let cli = Cli::parse_from([
            "clipbridge-client",
            "-s",
            "http://relay:9000",
            "-p",
            "7",
        ]);
        let mut config = ClientConfig::default();

        // Act
        let changed = cli.apply_to(&mut config).unwrap();

        // Assert
        assert!(changed);
        assert_eq!(config.server.url, "ws://relay:9000/ws");
        assert_eq!(config.messaging.target_user_id, Some(7));
    }

    #[test]
    fn test_apply_to_without_settings_changes_nothing() {
        let cli = Cli::parse_from(["clipbridge-client", "-m", "hello"]);
        let mut config = ClientConfig::default();
        assert!(!cli.apply_to(&mut config).unwrap());
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_apply_to_rejects_invalid_server() {
        let cli = Cli::parse_from(["clipbridge-client", "-s", "ftp://relay"]);
        tokio_test::assert_err!(cli.apply_to(&mut ClientConfig::default()));
    }

    #[test]
    fn test_timeout_flag_overrides_config() {
        let config = ClientConfig::default();
        let cli = Cli::parse_from(["clipbridge-client", "--timeout", "5"]);
        assert_eq!(cli.connect_timeout(&config), Duration::from_secs(5));

        let cli = Cli::parse_from(["clipbridge-client"]);
        assert_eq!(cli.connect_timeout(&config), Duration::from_secs(30));
    }
}
