//! Outbound routing of frames to connected websocket sessions.
//!
//! Each session task owns the write half of its websocket and drains an mpsc
//! queue.  The hub keeps the sending end of every queue, keyed by
//! [`ClientId`], so any task (the Telegram notifier in particular) can push
//! a frame to a specific client without touching its socket.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use clipbridge_core::protocol::REPLY_DESTINATION;
use clipbridge_core::{ClientId, ReplyMessage, ServerFrame};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use crate::application::session_registry::SharedSessions;
use crate::domain::ports::{ClientMessenger, DeliveryError};

/// Outbound side of one attached session.
struct SessionHandle {
    frames: mpsc::Sender<ServerFrame>,
    subscriptions: HashSet<String>,
}

/// Registry of outbound frame queues for all live sessions.
pub struct SessionHub {
    sessions: SharedSessions,
    handles: RwLock<HashMap<ClientId, SessionHandle>>,
}

impl SessionHub {
    pub fn new(sessions: SharedSessions) -> Self {
        Self {
            sessions,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Attaches a session's outbound queue.  Replaces any previous queue.
    pub async fn attach(&self, client_id: ClientId, frames: mpsc::Sender<ServerFrame>) {
        self.handles.write().await.insert(
            client_id,
            SessionHandle {
                frames,
                subscriptions: HashSet::new(),
            },
        );
    }

    /// Detaches a session; frames for it are no longer deliverable.
    pub async fn detach(&self, client_id: &ClientId) {
        self.handles.write().await.remove(client_id);
    }

    /// Records a subscription.  Returns `false` if the session is not attached.
    pub async fn subscribe(&self, client_id: &ClientId, destination: &str) -> bool {
        match self.handles.write().await.get_mut(client_id) {
            Some(handle) => {
                handle.subscriptions.insert(destination.to_string());
                true
            }
            None => false,
        }
    }

    /// Number of attached sessions.
    pub async fn attached_count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Publishes `reply` to every session subscribed to `destination`.
    ///
    /// Returns the number of sessions the frame was queued for.
    pub async fn broadcast(&self, destination: &str, reply: &ReplyMessage) -> usize {
        let targets: Vec<(ClientId, mpsc::Sender<ServerFrame>)> = self
            .handles
            .read()
            .await
            .iter()
            .filter(|(_, handle)| handle.subscriptions.contains(destination))
            .map(|(id, handle)| (id.clone(), handle.frames.clone()))
            .collect();

        let mut queued = 0;
        for (id, frames) in targets {
            let frame = ServerFrame::Message {
                destination: destination.to_string(),
                body: reply.clone(),
            };
            if frames.send(frame).await.is_ok() {
                queued += 1;
            } else {
                debug!("broadcast to {id} skipped: queue closed");
            }
        }
        queued
    }
}

#[async_trait]
impl ClientMessenger for SessionHub {
    async fn send_to_client(
        &self,
        client_id: &ClientId,
        reply: ReplyMessage,
    ) -> Result<(), DeliveryError> {
        if !client_id.is_known() {
            return Err(DeliveryError::InvalidClientId(client_id.clone()));
        }

        {
            let sessions = self.sessions.lock().await;
            if sessions.is_disconnected(client_id) {
                return Err(DeliveryError::Disconnected(client_id.clone()));
            }
            if !sessions.is_active(client_id) {
                warn!("client {client_id} is not active; attempting delivery anyway");
            }
        }

        let frames = self
            .handles
            .read()
            .await
            .get(client_id)
            .map(|handle| handle.frames.clone());

        let Some(frames) = frames else {
            self.sessions.lock().await.mark_disconnected(client_id);
            return Err(DeliveryError::NoSession(client_id.clone()));
        };

        let frame = ServerFrame::Message {
            destination: REPLY_DESTINATION.to_string(),
            body: reply,
        };
        if frames.send(frame).await.is_err() {
            self.sessions.lock().await.mark_disconnected(client_id);
            self.detach(client_id).await;
            return Err(DeliveryError::ConnectionClosed(client_id.clone()));
        }
        Ok(())
    }
}
