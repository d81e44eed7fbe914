//! A single named channel and its subscriber list (C2).

use crate::session::Session;
use broker_protocol::ServerMessage;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("session is not subscribed to this channel")]
    NotSubscribed,
}

pub struct Channel {
    name: String,
    subscribers: Mutex<Vec<Arc<Session>>>,
}

impl Channel {
    pub fn new(name: String) -> Self {
        Self {
            name,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends unconditionally. A session that subscribes twice receives
    /// every broadcast twice -- the distilled spec leaves this behavior in
    /// place rather than de-duplicating (§9 Open Question).
    pub async fn subscribe(&self, session: Arc<Session>) {
        self.subscribers.lock().await.push(session);
    }

    pub async fn unsubscribe(&self, session: &Arc<Session>) -> Result<(), ChannelError> {
        let mut subs = self.subscribers.lock().await;
        let pos = subs
            .iter()
            .position(|s| s.id == session.id)
            .ok_or(ChannelError::NotSubscribed)?;
        subs.remove(pos);
        Ok(())
    }

    /// Fans `message` out to every current subscriber. A subscriber whose
    /// outbox is full or closed is logged and skipped -- one slow or dead
    /// subscriber never blocks delivery to the rest (§7 `BroadcastDeliveryError`).
    pub async fn broadcast(&self, message: ServerMessage) {
        let subs = self.subscribers.lock().await;
        for session in subs.iter() {
            session.send(message.clone());
        }
        if subs.is_empty() {
            warn!(channel = %self.name, "broadcast to channel with no subscribers");
        }
    }

    pub async fn contains(&self, session: &Arc<Session>) -> bool {
        self.subscribers.lock().await.iter().any(|s| s.id == session.id)
    }

    pub async fn count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}
