//! Message Batcher: per-room priority queues that amortize fan-out cost by
//! flushing non-critical messages in small time-bounded batches (spec §4.9).
//!
//! Builds on the same `mpsc`-channel write-loop shape the teacher uses per
//! connection (`gateway/ws.rs`'s `client_tx`/`client_rx`), but one channel
//! per room instead of per connection.

pub mod error;
pub mod queue;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;
use streamhub_common::types::RoomId;
use streamhub_metrics::{batcher as batcher_metrics, counter, gauge, histogram};
use tokio::sync::mpsc;

pub use {
    error::{Error, Result},
    queue::{Batch, MAX_BATCH_BYTES, MAX_BATCH_MESSAGES, Priority, QueuedMessage, RoomQueue},
};

const FAST_FLUSH: Duration = Duration::from_millis(50);
const DEFAULT_FLUSH: Duration = Duration::from_millis(100);
const DEFERRED_FLUSH: Duration = Duration::from_millis(500);

struct RoomHandle {
    sender: mpsc::UnboundedSender<QueuedMessage>,
}

/// Fans batched messages out of the queueing task. The batcher itself does
/// not know how to deliver a batch — that is the caller's job (typically
/// `streamhub-sessions::SessionRegistry::send_to` per room member).
pub type BatchSink = Arc<dyn Fn(RoomId, Batch) + Send + Sync>;

pub struct Batcher {
    rooms: DashMap<RoomId, RoomHandle>,
    sink: BatchSink,
    next_batch_id: AtomicU64,
}

impl Batcher {
    pub fn new(sink: BatchSink) -> Arc<Self> {
        Arc::new(Self { rooms: DashMap::new(), sink, next_batch_id: AtomicU64::new(1) })
    }

    /// Enqueue a message for `room_id`. Priority 0 bypasses queueing
    /// entirely and is handed straight to the sink.
    pub fn enqueue(self: &Arc<Self>, room_id: RoomId, priority: Priority, payload: Vec<u8>) {
        if priority == Priority::Immediate {
            let id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
            (self.sink)(room_id, Batch { id, messages: vec![payload], avg_queue_time: Duration::ZERO });
            return;
        }

        let sender = {
            if let Some(handle) = self.rooms.get(&room_id) {
                handle.sender.clone()
            } else {
                let sender = self.spawn_room(room_id.clone());
                sender
            }
        };
        let msg = QueuedMessage { payload, priority, enqueued_at: Instant::now() };
        let _ = sender.send(msg);
    }

    fn spawn_room(self: &Arc<Self>, room_id: RoomId) -> mpsc::UnboundedSender<QueuedMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedMessage>();
        self.rooms.insert(room_id.clone(), RoomHandle { sender: tx.clone() });

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut queue = RoomQueue::default();
            let mut fast_timer = tokio::time::interval(FAST_FLUSH);
            let mut default_timer = tokio::time::interval(DEFAULT_FLUSH);
            let mut deferred_timer = tokio::time::interval(DEFERRED_FLUSH);
            let mut idle_ticks = 0u32;

            loop {
                tokio::select! {
                    maybe_msg = rx.recv() => {
                        match maybe_msg {
                            Some(msg) => { queue.enqueue(msg); idle_ticks = 0; },
                            None => break,
                        }
                    }
                    _ = fast_timer.tick() => this.flush(&room_id, &mut queue, Priority::Fast),
                    _ = default_timer.tick() => this.flush(&room_id, &mut queue, Priority::Default),
                    _ = deferred_timer.tick() => this.flush(&room_id, &mut queue, Priority::Deferred),
                }

                if queue.is_empty() {
                    idle_ticks += 1;
                    if idle_ticks > 20 {
                        break;
                    }
                }
                gauge!(batcher_metrics::QUEUE_DEPTH).set(queue.queue_depth() as f64);
            }
            this.rooms.remove(&room_id);
        });

        tx
    }

    fn flush(&self, room_id: &RoomId, queue: &mut RoomQueue, priority: Priority) {
        let drained = queue.drain(priority);
        if drained.is_empty() {
            return;
        }
        let started = Instant::now();
        let count = drained.len();
        let id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
        let batch = Batch::from_queued(id, started, drained);
        (self.sink)(room_id.clone(), batch);

        counter!(batcher_metrics::BATCHES_FLUSHED_TOTAL).increment(1);
        counter!(batcher_metrics::MESSAGES_BATCHED_TOTAL).increment(count as u64);
        histogram!(batcher_metrics::FLUSH_LATENCY_SECONDS).record(started.elapsed().as_secs_f64());
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn immediate_priority_bypasses_queueing() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&received);
        let batcher = Batcher::new(Arc::new(move |_room, batch: Batch| {
            captured.lock().unwrap_or_else(|e| e.into_inner()).push(batch);
        }));
        batcher.enqueue("room1".to_string(), Priority::Immediate, b"hi".to_vec());
        assert_eq!(received.lock().unwrap_or_else(|e| e.into_inner()).len(), 1);
    }

    #[tokio::test]
    async fn queued_priority_flushes_on_the_fast_timer() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&received);
        let batcher = Batcher::new(Arc::new(move |_room, batch: Batch| {
            captured.lock().unwrap_or_else(|e| e.into_inner()).push(batch);
        }));
        batcher.enqueue("room1".to_string(), Priority::Fast, b"hi".to_vec());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!received.lock().unwrap_or_else(|e| e.into_inner()).is_empty());
    }
}
