//! Periodic session maintenance: stats logging and purging of old
//! disconnected sessions.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::application::session_registry::{SessionStats, SharedSessions};
use crate::infrastructure::hub::SessionHub;

/// One housekeeping pass.  Returns the stats observed after purging.
pub async fn sweep(sessions: &SharedSessions, retention: Duration) -> SessionStats {
    let mut registry = sessions.lock().await;
    let purged = registry.purge_disconnected_older_than(retention);
    if purged > 0 {
        debug!("purged {purged} disconnected sessions older than {retention:?}");
    }
    registry.stats()
}

/// Runs [`sweep`] every `every` until `running` is cleared.
pub async fn run_housekeeping(
    sessions: SharedSessions,
    hub: Arc<SessionHub>,
    every: Duration,
    retention: Duration,
    running: Arc<AtomicBool>,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    while running.load(Ordering::Relaxed) {
        ticker.tick().await;
        let stats = sweep(&sessions, retention).await;
        info!(
            "sessions: {} active, {} disconnected, {} total, {} disconnections, {} sockets",
            stats.active,
            stats.disconnected,
            stats.total,
            stats.disconnections,
            hub.attached_count().await
        );
    }
}
