//! The client registry and admission gate (C5).
//!
//! The distilled spec's gate is a boolean `threading.Event` toggled by hand
//! at every connect/disconnect. Here it is redesigned as a counting
//! `tokio::sync::Semaphore` sized to `MAX_CLIENTS`: a permit is acquired
//! before `accept` and moved into the session task, which drops it the
//! instant the session ends. The gate reopens itself; there is no boolean
//! to forget to reset (§4.5 REDESIGN, §9).

use crate::registry::ChannelRegistry;
use crate::server::Core;
use crate::session::{run_session, Session};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

pub struct ClientRegistry {
    channels: Arc<ChannelRegistry>,
    sessions: Mutex<Vec<Arc<Session>>>,
    admission: Arc<Semaphore>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new(channels: Arc<ChannelRegistry>, max_clients: usize) -> Arc<Self> {
        Arc::new(Self {
            channels,
            sessions: Mutex::new(Vec::new()),
            admission: Arc::new(Semaphore::new(max_clients)),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn admission(&self) -> Arc<Semaphore> {
        Arc::clone(&self.admission)
    }

    /// Takes ownership of an accepted socket and its admission permit, and
    /// spawns its session task. The permit rides along inside the task and
    /// is dropped when the task ends, which is what actually releases the
    /// admission slot back to the gate.
    pub fn add<S>(self: &Arc<Self>, stream: S, permit: OwnedSemaphorePermit, core: Arc<Core>)
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(run_session(stream, id, permit, core));
    }

    pub async fn track(&self, session: Arc<Session>) {
        self.sessions.lock().await.push(session);
    }

    /// Removes the session from every channel it belongs to, then from the
    /// registry itself. Called once, from the session task that owns it,
    /// after its read loop ends.
    pub async fn remove(&self, session: &Arc<Session>) {
        for name in self.channels.channels_of(session).await {
            let _ = self.channels.unsubscribe(&name, session).await;
        }
        self.sessions.lock().await.retain(|s| s.id != session.id);
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
