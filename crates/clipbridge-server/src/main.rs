//! Clipboard bridge relay server: entry point.
//!
//! Desktop clients connect over websocket and send text; the server forwards
//! it to a Telegram user with a "Reply" button.  Whatever the Telegram user
//! types after pressing the button is routed back to the originating client.
//!
//! # Usage
//!
//! ```text
//! clipbridge-server --bot-token <TOKEN> --main-user-id <ID> [OPTIONS]
//!
//! Options:
//!   --bind <IP>                   Listen address [default: 0.0.0.0]
//!   --port <PORT>                 Listen port [default: 8080]
//!   --bot-username <NAME>         Bot username, for logs
//!   --poll-timeout <SECS>         getUpdates long-poll timeout [default: 30]
//!   --housekeeping-interval <SECS> Stats / purge interval [default: 300]
//!   --retention <SECS>            Keep disconnected sessions this long [default: 3600]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                           | Flag                      |
//! |------------------------------------|---------------------------|
//! | `CLIPBRIDGE_BIND`                  | `--bind`                  |
//! | `CLIPBRIDGE_PORT`                  | `--port`                  |
//! | `TELEGRAM_BOT_TOKEN`               | `--bot-token`             |
//! | `TELEGRAM_BOT_USERNAME`            | `--bot-username`          |
//! | `TELEGRAM_MAIN_USER_ID`            | `--main-user-id`          |
//! | `TELEGRAM_API_URL`                 | `--telegram-api-url`      |
//! | `CLIPBRIDGE_POLL_TIMEOUT`          | `--poll-timeout`          |
//! | `CLIPBRIDGE_HOUSEKEEPING_INTERVAL` | `--housekeeping-interval` |
//! | `CLIPBRIDGE_RETENTION`             | `--retention`             |

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clipbridge_server::application::{CommandProcessor, SessionRegistry, TelegramNotifier};
use clipbridge_server::domain::config::DEFAULT_TELEGRAM_API_URL;
use clipbridge_server::domain::{ServerConfig, TelegramConfig, Update};
use clipbridge_server::infrastructure::{
    run_housekeeping, run_polling, run_server, ServerContext, SessionHub, TelegramBotAdapter,
};

/// Buffered Telegram updates between the poller and the notifier.
const UPDATE_QUEUE_DEPTH: usize = 100;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Clipboard bridge relay server.
#[derive(Debug, Parser)]
#[command(
    name = "clipbridge-server",
    about = "Relays clipboard text between websocket clients and a Telegram bot",
    version
)]
struct Cli {
    /// IP address to bind the websocket endpoint to.
    #[arg(long, default_value = "0.0.0.0", env = "CLIPBRIDGE_BIND")]
    bind: String,

    /// TCP port of the websocket endpoint.
    #[arg(long, default_value_t = 8080, env = "CLIPBRIDGE_PORT")]
    port: u16,

    /// Bot token issued by @BotFather.
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    bot_token: String,

    /// Bot username, only used in log output.
    #[arg(long, default_value = "clipbridge_bot", env = "TELEGRAM_BOT_USERNAME")]
    bot_username: String,

    /// Telegram user that always receives broadcasts.
    #[arg(long, env = "TELEGRAM_MAIN_USER_ID")]
    main_user_id: i64,

    /// Bot API base URL.
    #[arg(long, default_value = DEFAULT_TELEGRAM_API_URL, env = "TELEGRAM_API_URL")]
    telegram_api_url: String,

    /// `getUpdates` long-poll timeout in seconds.
    #[arg(long, default_value_t = 30, env = "CLIPBRIDGE_POLL_TIMEOUT")]
    poll_timeout: u64,

    /// Seconds between session housekeeping passes.
    #[arg(long, default_value_t = 300, env = "CLIPBRIDGE_HOUSEKEEPING_INTERVAL")]
    housekeeping_interval: u64,

    /// Seconds a disconnected session is remembered.
    #[arg(long, default_value_t = 3600, env = "CLIPBRIDGE_RETENTION")]
    retention: u64,
}

impl Cli {
    /// Validates the arguments and builds a [`ServerConfig`].
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;

        if self.bot_token.trim().is_empty() {
            bail!("bot token must not be empty");
        }
        // Zero would turn long polling into a busy loop against the Bot API.
        if self.poll_timeout == 0 {
            bail!("poll timeout must be at least one second");
        }
        if self.housekeeping_interval == 0 {
            bail!("housekeeping interval must be at least one second");
        }

        Ok(ServerConfig {
            bind_addr,
            telegram: TelegramConfig {
                bot_token: self.bot_token.trim().to_string(),
                bot_username: self.bot_username,
                main_user_id: self.main_user_id,
                api_url: self.telegram_api_url,
                poll_timeout: Duration::from_secs(self.poll_timeout),
            },
            housekeeping_interval: Duration::from_secs(self.housekeeping_interval),
            disconnected_retention: Duration::from_secs(self.retention),
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;
    info!(
        "clipboard bridge server starting: ws={}, bot=@{}",
        config.local_ws_url(),
        config.telegram.bot_username
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    // ── Wiring ────────────────────────────────────────────────────────────────
    let sessions = SessionRegistry::shared();
    let hub = Arc::new(SessionHub::new(Arc::clone(&sessions)));
    let adapter = Arc::new(
        TelegramBotAdapter::new(&config.telegram).context("failed to build Telegram client")?,
    );
    match adapter.get_me().await {
        Ok(me) => info!(
            "authenticated with Telegram as {}",
            me.username.as_deref().unwrap_or(&me.first_name)
        ),
        Err(e) => warn!("Telegram credential check failed: {e}"),
    }

    let notifier = Arc::new(TelegramNotifier::new(
        adapter.clone(),
        Arc::clone(&sessions),
        hub.clone(),
    ));
    let processor = Arc::new(CommandProcessor::new(notifier.clone()));
    let ctx = Arc::new(ServerContext::new(
        Arc::clone(&sessions),
        hub.clone(),
        processor,
        notifier.clone(),
    ));

    // ── Background tasks ──────────────────────────────────────────────────────
    let (updates_tx, mut updates_rx) = mpsc::channel::<Update>(UPDATE_QUEUE_DEPTH);
    let polling = tokio::spawn(run_polling(adapter, updates_tx, Arc::clone(&running)));
    let pump = tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            notifier.handle_update(&update).await;
        }
    });
    let housekeeping = tokio::spawn(run_housekeeping(
        Arc::clone(&sessions),
        hub,
        config.housekeeping_interval,
        config.disconnected_retention,
        Arc::clone(&running),
    ));

    let result = run_server(&config, ctx, running).await;

    polling.abort();
    pump.abort();
    housekeeping.abort();
    info!("clipboard bridge server stopped");
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
