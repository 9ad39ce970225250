//! Registry of websocket client sessions.
//!
//! Every connection registers here under the [`ClientId`] the server assigned
//! it.  The Telegram side consults the registry before offering a "Reply"
//! button or delivering a reply, so a Telegram user is told when the desktop
//! client on the other end has already gone away.
//!
//! # Session lifecycle
//!
//! ```text
//! register ──► Active ──(touch)──► Active
//!                │
//!         mark_disconnected
//!                ▼
//!          Disconnected ──(cleanup / purge)──► forgotten
//! ```
//!
//! A disconnected id stays in the disconnected set so notifications can say
//! *how long ago* the client left.  Registering the same id again revives it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clipbridge_core::ClientId;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Registry shared between websocket sessions, the hub and the notifier.
pub type SharedSessions = Arc<Mutex<SessionRegistry>>;

/// Connection timestamps of one active session.
#[derive(Debug, Clone, Copy)]
struct SessionTimes {
    connected_at: Instant,
    last_activity: Instant,
}

/// Counter snapshot returned by [`SessionRegistry::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Sessions currently registered as active.
    pub active: usize,
    /// Sessions currently remembered as disconnected.
    pub disconnected: usize,
    /// Registrations since start-up.
    pub total: u64,
    /// Disconnections since start-up.
    pub disconnections: u64,
}

/// In-memory registry of client sessions.
///
/// The registry is stored behind a `tokio::sync::Mutex` ([`SharedSessions`])
/// so it can be shared between the session tasks, the hub, and the Telegram
/// notifier.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: HashMap<ClientId, SessionTimes>,
    disconnected: HashSet<ClientId>,
    connected_at: HashMap<ClientId, Instant>,
    disconnected_at: HashMap<ClientId, Instant>,
    total_registered: u64,
    disconnections: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a fresh registry for sharing.
    pub fn shared() -> SharedSessions {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Registers a newly connected session.
    pub fn register(&mut self, id: &ClientId) {
        let now = Instant::now();
        self.active.insert(
            id.clone(),
            SessionTimes {
                connected_at: now,
                last_activity: now,
            },
        );
        self.connected_at.insert(id.clone(), now);
        self.disconnected.remove(id);
        self.total_registered += 1;
        info!(
            "client {id} registered ({} active, {} total)",
            self.active.len(),
            self.total_registered
        );
    }

    /// Records activity on a session and clears any disconnected mark.
    pub fn touch(&mut self, id: &ClientId) {
        let now = Instant::now();
        self.active
            .entry(id.clone())
            .and_modify(|times| times.last_activity = now)
            .or_insert(SessionTimes {
                connected_at: now,
                last_activity: now,
            });
        self.connected_at.entry(id.clone()).or_insert(now);
        if self.disconnected.remove(id) {
            debug!("client {id} active again after disconnect mark");
        }
    }

    /// Marks a session disconnected.
    ///
    /// Returns `false` when the id is unknown/empty or the session was
    /// already marked disconnected.
    pub fn mark_disconnected(&mut self, id: &ClientId) -> bool {
        if !id.is_known() || self.disconnected.contains(id) {
            return false;
        }

        let now = Instant::now();
        self.active.remove(id);
        self.disconnected.insert(id.clone());
        self.disconnected_at.insert(id.clone(), now);
        self.disconnections += 1;

        match self.connected_at.get(id) {
            Some(connected) => info!(
                "client {id} disconnected after {:.1}s",
                now.duration_since(*connected).as_secs_f64()
            ),
            None => info!("client {id} disconnected (connect time unknown)"),
        }
        true
    }

    /// Active means registered and not marked disconnected.
    pub fn is_active(&self, id: &ClientId) -> bool {
        self.active.contains_key(id) && !self.disconnected.contains(id)
    }

    pub fn is_disconnected(&self, id: &ClientId) -> bool {
        self.disconnected.contains(id)
    }

    pub fn last_activity(&self, id: &ClientId) -> Option<Instant> {
        self.active.get(id).map(|times| times.last_activity)
    }

    pub fn last_disconnect_time(&self, id: &ClientId) -> Option<Instant> {
        self.disconnected_at.get(id).copied()
    }

    /// Length of the most recent session: disconnect time minus connect time.
    pub fn last_session_duration(&self, id: &ClientId) -> Option<Duration> {
        let connected = self.connected_at.get(id)?;
        let disconnected = self.disconnected_at.get(id)?;
        Some(disconnected.saturating_duration_since(*connected))
    }

    /// Forgets everything about a session.
    pub fn remove(&mut self, id: &ClientId) {
        self.active.remove(id);
        self.disconnected.remove(id);
        self.connected_at.remove(id);
        self.disconnected_at.remove(id);
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn disconnected_count(&self) -> usize {
        self.disconnected.len()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            active: self.active.len(),
            disconnected: self.disconnected.len(),
            total: self.total_registered,
            disconnections: self.disconnections,
        }
    }

    /// Clears the whole disconnected set; returns how many ids it held.
    pub fn cleanup_disconnected(&mut self) -> usize {
        let count = self.disconnected.len();
        self.disconnected.clear();
        if count > 0 {
            info!("cleared {count} disconnected sessions");
        }
        count
    }

    /// Forgets disconnected sessions that left at least `age` ago.
    ///
    /// Unlike [`cleanup_disconnected`](Self::cleanup_disconnected) this also
    /// drops their timestamps, so memory does not grow with every connection
    /// the server has ever seen.
    pub fn purge_disconnected_older_than(&mut self, age: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<ClientId> = self
            .disconnected
            .iter()
            .filter(|id| {
                self.disconnected_at
                    .get(*id)
                    .map_or(true, |at| now.saturating_duration_since(*at) >= age)
            })
            .cloned()
            .collect();

        for id in &stale {
            self.disconnected.remove(id);
            self.connected_at.remove(id);
            self.disconnected_at.remove(id);
        }
        stale.len()
    }
}
