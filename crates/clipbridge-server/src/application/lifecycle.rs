//! Connect / subscribe / disconnect events raised by the websocket layer.
//!
//! A single connection can report its end more than once (a `Disconnect`
//! frame followed by the socket closing, or a write failure racing the read
//! loop).  Disconnects are therefore deduplicated by session key and by
//! client id, both within a short TTL.  Expired entries are dropped on every
//! disconnect, so memory stays bounded by the disconnect rate over one TTL.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use clipbridge_core::ClientId;
use tracing::debug;

use super::session_registry::SessionRegistry;

/// How long a processed disconnect is remembered per session key.
pub const DISCONNECT_DEDUP_TTL: Duration = Duration::from_secs(10);

/// Outcome of [`SessionLifecycle::on_disconnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// The session was marked disconnected in the registry.
    Recorded,
    /// The session was already disconnected in the registry.
    AlreadyDisconnected,
    /// This session key was processed within the TTL.
    DuplicateSession,
    /// This client id was processed within the TTL and has not reconnected.
    DuplicateClient,
}

/// Deduplicating handler for session events.
#[derive(Debug)]
pub struct SessionLifecycle {
    ttl: Duration,
    /// Session key → when it was processed, and for which client.
    processed_disconnects: HashMap<String, (Instant, ClientId)>,
    processed_clients: HashSet<ClientId>,
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::with_ttl(DISCONNECT_DEDUP_TTL)
    }
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            processed_disconnects: HashMap::new(),
            processed_clients: HashSet::new(),
        }
    }

    /// A websocket session finished its handshake.
    pub fn on_connected(&mut self, registry: &mut SessionRegistry, client_id: &ClientId) {
        registry.register(client_id);
        self.processed_clients.remove(client_id);
    }

    /// A session subscribed to a destination.
    pub fn on_subscribed(&mut self, registry: &mut SessionRegistry, client_id: &ClientId) {
        registry.touch(client_id);
    }

    /// A session ended.
    pub fn on_disconnected(
        &mut self,
        registry: &mut SessionRegistry,
        session_key: &str,
        client_id: &ClientId,
    ) -> DisconnectOutcome {
        let now = Instant::now();
        self.purge_expired(now);

        if self.processed_disconnects.contains_key(session_key) {
            debug!("duplicate disconnect for session {session_key} ignored");
            return DisconnectOutcome::DuplicateSession;
        }
        if self.processed_clients.contains(client_id) {
            debug!("duplicate disconnect for client {client_id} ignored");
            return DisconnectOutcome::DuplicateClient;
        }

        self.processed_disconnects
            .insert(session_key.to_string(), (now, client_id.clone()));
        self.processed_clients.insert(client_id.clone());

        if registry.is_disconnected(client_id) {
            return DisconnectOutcome::AlreadyDisconnected;
        }
        registry.mark_disconnected(client_id);
        DisconnectOutcome::Recorded
    }

    /// Forgets session keys older than the TTL along with their client ids.
    fn purge_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        let clients = &mut self.processed_clients;
        self.processed_disconnects.retain(|_, (at, client_id)| {
            let live = now.saturating_duration_since(*at) < ttl;
            if !live {
                clients.remove(client_id);
            }
            live
        });
    }

    /// Number of session keys currently remembered.
    pub fn tracked_disconnects(&self) -> usize {
        self.processed_disconnects.len()
    }

    /// Number of client ids currently remembered.
    pub fn tracked_clients(&self) -> usize {
        self.processed_clients.len()
    }
}
