//! Time-event scheduler (C6): an earliest-deadline-first queue serviced by
//! a single timer task, reseated whenever the head of the queue changes.

use crate::registry::ChannelRegistry;
use crate::time::now_timestamp;
use broker_protocol::{ServerMessage, TimeEventPayload};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TimeEvent {
    pub id: Uuid,
    pub channel: String,
    pub exec_timestamp: f64,
    pub data: Value,
    pub created_timestamp: f64,
    insertion_seq: u64,
}

/// The currently-running timer task's cancellation handle. Dropped (and
/// replaced) every time the head of the queue changes.
struct TimerHandle {
    event_id: Uuid,
    notify: Arc<Notify>,
    skipped: Arc<AtomicBool>,
}

pub struct Scheduler {
    channels: Arc<ChannelRegistry>,
    events: Mutex<Vec<TimeEvent>>,
    timer: Mutex<Option<TimerHandle>>,
    insertion_seq: AtomicU64,
}

impl Scheduler {
    pub fn new(channels: Arc<ChannelRegistry>) -> Arc<Self> {
        Arc::new(Self {
            channels,
            events: Mutex::new(Vec::new()),
            timer: Mutex::new(None),
            insertion_seq: AtomicU64::new(0),
        })
    }

    pub async fn count(&self) -> usize {
        self.events.lock().await.len()
    }

    /// Inserts the event in sorted order (earliest `exec_timestamp` first,
    /// ties broken by arrival order) and reseats the timer if the insertion
    /// changed the head.
    pub async fn add_event(self: &Arc<Self>, channel: String, data: Value, exec_timestamp: f64) -> Uuid {
        let id = Uuid::new_v4();
        let head_after_insert;
        {
            let mut events = self.events.lock().await;
            let seq = self.insertion_seq.fetch_add(1, Ordering::SeqCst);
            let event = TimeEvent {
                id,
                channel,
                exec_timestamp,
                data,
                created_timestamp: now_timestamp(),
                insertion_seq: seq,
            };
            let pos = events
                .iter()
                .position(|existing| {
                    (event.exec_timestamp, event.insertion_seq)
                        < (existing.exec_timestamp, existing.insertion_seq)
                })
                .unwrap_or(events.len());
            events.insert(pos, event);
            head_after_insert = events.first().cloned();
        }
        self.reseat_timer(head_after_insert).await;
        id
    }

    /// Replaces the running timer (if any) with one watching `head`. If the
    /// running timer already watches the same event, it is left alone.
    /// Acquires only the executor-mutex: `head` must be read by the caller
    /// under the events-mutex beforehand, since `fire` calls this while
    /// still holding that lock (events-mutex -> executor-mutex, never
    /// reversed).
    async fn reseat_timer(self: &Arc<Self>, head: Option<TimeEvent>) {
        let mut slot = self.timer.lock().await;

        if let Some(existing) = slot.as_ref() {
            if let Some(event) = &head {
                if existing.event_id == event.id {
                    return;
                }
            }
            existing.skipped.store(true, Ordering::SeqCst);
            existing.notify.notify_one();
        }
        *slot = None;

        if let Some(event) = head {
            let notify = Arc::new(Notify::new());
            let skipped = Arc::new(AtomicBool::new(false));
            *slot = Some(TimerHandle {
                event_id: event.id,
                notify: Arc::clone(&notify),
                skipped: Arc::clone(&skipped),
            });
            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.run_timer(event, notify, skipped).await;
            });
        }
    }

    async fn run_timer(self: Arc<Self>, event: TimeEvent, notify: Arc<Notify>, skipped: Arc<AtomicBool>) {
        let delay = event.exec_timestamp - now_timestamp();
        if delay > 0.0 {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs_f64(delay)) => {}
                () = notify.notified() => {}
            }
        }
        if skipped.load(Ordering::SeqCst) {
            debug!(event_id = %event.id, "time event timer preempted before firing");
            return;
        }
        self.fire(event).await;
    }

    /// Broadcasts the event and removes it from the queue, then reseats the
    /// timer for whatever is now at the head. If the broadcast fails to
    /// deliver, the queue is left untouched and the scheduler stalls until
    /// the next `add_event` call reseats it -- a known anti-feature carried
    /// over unchanged (§9 Open Question).
    async fn fire(self: Arc<Self>, event: TimeEvent) {
        let mut events = self.events.lock().await;
        match events.first() {
            Some(head) if head.id == event.id => {}
            _ => return,
        }

        let payload = TimeEventPayload {
            id: event.id,
            channel_name: event.channel.clone(),
            timestamp: event.created_timestamp,
            exec_timestamp: event.exec_timestamp,
            data: event.data.clone(),
        };
        self.channels
            .broadcast(&[event.channel.clone()], ServerMessage::time_event(payload))
            .await;

        events.remove(0);
        let head_after_fire = events.first().cloned();
        drop(events);
        self.reseat_timer(head_after_fire).await;
    }
}
