//! The channel registry (C3): creates channels lazily on first subscribe
//! and destroys them the instant their subscriber count drops to zero.

use crate::channel::{Channel, ChannelError};
use crate::session::Session;
use broker_protocol::ServerMessage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub struct ChannelRegistry {
    channels: Mutex<HashMap<String, Arc<Channel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: Mutex::new(HashMap::new()),
        })
    }

    /// Lock order: the registry-mutex is held only long enough to find or
    /// create the channel handle, then released before the channel-mutex
    /// is ever touched (registry-mutex -> channel-mutex, never reversed).
    pub async fn subscribe(&self, name: &str, session: Arc<Session>) {
        let channel = {
            let mut channels = self.channels.lock().await;
            channels
                .entry(name.to_owned())
                .or_insert_with(|| {
                    debug!(channel = name, "channel created");
                    Arc::new(Channel::new(name.to_owned()))
                })
                .clone()
        };
        channel.subscribe(session).await;
    }

    pub async fn unsubscribe(&self, name: &str, session: &Arc<Session>) -> Result<(), ChannelError> {
        let channel = {
            let channels = self.channels.lock().await;
            channels.get(name).cloned()
        };
        let channel = channel.ok_or(ChannelError::NotSubscribed)?;
        channel.unsubscribe(session).await?;

        if channel.count().await == 0 {
            let mut channels = self.channels.lock().await;
            if matches!(channels.get(name), Some(current) if Arc::ptr_eq(current, &channel)) {
                channels.remove(name);
                debug!(channel = name, "channel destroyed (no subscribers left)");
            }
        }
        Ok(())
    }

    /// Best-effort: a channel named in `names` that does not exist (never
    /// subscribed, or already torn down) is silently skipped, matching the
    /// distilled spec's "publish to a channel with no subscribers is a no-op".
    pub async fn broadcast(&self, names: &[String], message: ServerMessage) {
        for name in names {
            let channel = {
                let channels = self.channels.lock().await;
                channels.get(name).cloned()
            };
            if let Some(channel) = channel {
                channel.broadcast(message.clone()).await;
            }
        }
    }

    pub async fn channels_of(&self, session: &Arc<Session>) -> Vec<String> {
        let snapshot: Vec<(String, Arc<Channel>)> = {
            let channels = self.channels.lock().await;
            channels.iter().map(|(name, ch)| (name.clone(), ch.clone())).collect()
        };
        let mut names = Vec::new();
        for (name, channel) in snapshot {
            if channel.contains(session).await {
                names.push(name);
            }
        }
        names
    }

    pub async fn names(&self) -> Vec<String> {
        self.channels.lock().await.keys().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.channels.lock().await.len()
    }
}
