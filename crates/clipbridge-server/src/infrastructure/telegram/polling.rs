//! `getUpdates` long-poll loop.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::adapter::TelegramBotAdapter;
use crate::domain::telegram::Update;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Polls Telegram and forwards every update on `updates` until `running`
/// is cleared or the receiver is dropped.
///
/// The offset advances past each forwarded update, so Telegram does not
/// redeliver it.  Failed polls back off exponentially up to one minute.
pub async fn run_polling(
    adapter: Arc<TelegramBotAdapter>,
    updates: mpsc::Sender<Update>,
    running: Arc<AtomicBool>,
) {
    let mut offset: Option<i64> = None;
    let mut backoff = INITIAL_BACKOFF;
    info!("polling Telegram as @{}", adapter.bot_username());

    while running.load(Ordering::Relaxed) {
        match adapter.get_updates(offset).await {
            Ok(batch) => {
                backoff = INITIAL_BACKOFF;
                if !batch.is_empty() {
                    debug!("received {} updates", batch.len());
                }
                for update in batch {
                    offset = Some(update.update_id + 1);
                    if updates.send(update).await.is_err() {
                        info!("update consumer gone; stopping polling");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("getUpdates failed: {e}; retrying in {backoff:?}");
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
    info!("Telegram polling stopped");
}
