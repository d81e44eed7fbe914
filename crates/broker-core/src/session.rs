//! A connected client's handle, read loop, and write loop (C4).

use crate::server::Core;
use crate::time::now_timestamp;
use broker_protocol::{
    decode_frame, encode_frame, parse_client_request, split_stream, ClientRequest, InfoSnapshot,
    RequestError, ServerMessage,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tracing::{debug, info, warn};

/// Bounds how far a slow subscriber's queue can grow before messages start
/// being dropped for it specifically, without ever blocking the broadcaster
/// (§7 `BroadcastDeliveryError`, §9 design note).
const OUTBOX_CAPACITY: usize = 64;

/// A connected client. Cheap to clone (`Arc<Session>`); identity is `id`,
/// not pointer equality, so a session can be looked up after being cloned
/// into a channel's subscriber list.
pub struct Session {
    pub id: u64,
    pub connected_at: f64,
    received_bytes: AtomicU64,
    sent_bytes: AtomicU64,
    outbox: mpsc::Sender<ServerMessage>,
}

impl Session {
    fn new(id: u64) -> (Arc<Self>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (
            Arc::new(Self {
                id,
                connected_at: now_timestamp(),
                received_bytes: AtomicU64::new(0),
                sent_bytes: AtomicU64::new(0),
                outbox: tx,
            }),
            rx,
        )
    }

    /// Enqueues a message for this session's writer task. Never blocks or
    /// awaits: a full or already-closed queue is logged and the message is
    /// dropped, so one unresponsive subscriber can never stall a broadcast
    /// to the rest (§7).
    pub fn send(&self, message: ServerMessage) {
        if let Err(err) = self.outbox.try_send(message) {
            warn!(session_id = self.id, error = %err, "dropping message for session");
        }
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes.load(Ordering::Relaxed)
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes.load(Ordering::Relaxed)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
pub(crate) fn new_session_for_test(id: u64) -> (Arc<Session>, mpsc::Receiver<ServerMessage>) {
    Session::new(id)
}

/// Drives one connection end to end: registers the session, spawns its
/// writer task, runs the read loop until the peer disconnects or errors,
/// then tears the session down and releases its admission permit.
pub async fn run_session<S>(stream: S, id: u64, permit: OwnedSemaphorePermit, core: Arc<Core>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (session, outbox_rx) = Session::new(id);
    core.clients.track(Arc::clone(&session)).await;
    info!(session_id = id, clients = core.clients.count().await, "client connected");

    let (read_half, write_half) = tokio::io::split(stream);
    let writer = tokio::spawn(run_writer(write_half, outbox_rx, Arc::clone(&core), Arc::clone(&session)));

    run_reader(read_half, Arc::clone(&session), Arc::clone(&core)).await;

    // The peer is gone; no point draining the writer's queue.
    writer.abort();
    core.clients.remove(&session).await;
    drop(permit);
    info!(session_id = id, clients = core.clients.count().await, "client disconnected");
}

async fn run_reader<R>(mut read_half: R, session: Arc<Session>, core: Arc<Core>)
where
    R: AsyncRead + Unpin,
{
    let mut residual = Vec::new();
    let mut read_buf = vec![0u8; core.config.read_size];

    loop {
        let n = match read_half.read(&mut read_buf).await {
            Ok(0) => {
                debug!(session_id = session.id, "peer closed connection");
                break;
            }
            Ok(n) => n,
            Err(err) => {
                warn!(session_id = session.id, error = %err, "connection error");
                break;
            }
        };
        session.received_bytes.fetch_add(n as u64, Ordering::Relaxed);

        for payload in split_stream(&mut residual, &read_buf[..n]) {
            match decode_frame(core.config.codec.as_ref(), &payload) {
                Ok(value) => dispatch(&value, &session, &core).await,
                Err(err) => {
                    warn!(session_id = session.id, error = %err, "dropping malformed frame");
                }
            }
        }
    }
}

async fn dispatch(value: &serde_json::Value, session: &Arc<Session>, core: &Arc<Core>) {
    let request = match parse_client_request(value) {
        Ok(request) => request,
        Err(RequestError::UnknownAction(action)) => {
            session.send(ServerMessage::unknown_action(&action));
            return;
        }
        Err(err) => {
            warn!(session_id = session.id, error = %err, "rejecting malformed request");
            session.send(ServerMessage::error(err.to_string()));
            return;
        }
    };

    match request {
        ClientRequest::Ping => session.send(ServerMessage::pong()),
        ClientRequest::Subscribe { channel_name } => {
            core.channels.subscribe(&channel_name, Arc::clone(session)).await;
        }
        ClientRequest::Unsubscribe { channel_name } => {
            if let Err(err) = core.channels.unsubscribe(&channel_name, session).await {
                debug!(
                    session_id = session.id,
                    channel = %channel_name,
                    error = %err,
                    "unsubscribe of a channel this session isn't a member of"
                );
            }
        }
        ClientRequest::Info => {
            let snapshot = InfoSnapshot {
                started_time: core.started_at,
                uptime: round4(now_timestamp() - core.started_at),
                clients: core.clients.count().await,
                channels_num: core.channels.count().await,
                channels: core.channels.names().await,
                time_events_num: core.scheduler.count().await,
            };
            session.send(ServerMessage::info(snapshot));
        }
        ClientRequest::Publish { channel_name, data } => {
            core.channels
                .broadcast(&[channel_name], ServerMessage::published_event(data))
                .await;
        }
        ClientRequest::AddTimeEvent {
            channel_name,
            exec_timestamp,
            data,
        } => {
            core.scheduler.add_event(channel_name, data, exec_timestamp).await;
        }
    }
}

/// §9 design note: four decimal places, matching the distilled spec's
/// rounding of process uptime on the wire.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

async fn run_writer<W>(
    mut write_half: W,
    mut outbox_rx: mpsc::Receiver<ServerMessage>,
    core: Arc<Core>,
    session: Arc<Session>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbox_rx.recv().await {
        let value = match serde_json::to_value(&message) {
            Ok(value) => value,
            Err(err) => {
                warn!(session_id = session.id, error = %err, "failed to serialize outgoing message");
                continue;
            }
        };
        let bytes = match encode_frame(core.config.codec.as_ref(), &value) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(session_id = session.id, error = %err, "failed to encode outgoing message");
                continue;
            }
        };
        if let Err(err) = write_half.write_all(&bytes).await {
            warn!(session_id = session.id, error = %err, "failed to write to session socket");
            return;
        }
        session.sent_bytes.fetch_add(bytes.len() as u64, Ordering::Relaxed);
    }
}
