//! Per-room priority queue with byte/count caps and lowest-priority-drop
//! overflow (spec §4.9).

use std::time::{Duration, Instant};

use streamhub_metrics::{batcher as batcher_metrics, counter};

pub const MAX_BATCH_MESSAGES: usize = 50;
pub const MAX_BATCH_BYTES: usize = 64 * 1024;

/// Priority 0 bypasses queueing and is sent as soon as it is produced; 1-3
/// are queued and flushed on their own cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Immediate = 0,
    Fast = 1,
    Default = 2,
    Deferred = 3,
}

pub struct QueuedMessage {
    pub payload: Vec<u8>,
    pub priority: Priority,
    pub enqueued_at: Instant,
}

#[derive(Default)]
struct Tier {
    messages: Vec<QueuedMessage>,
    bytes: usize,
}

/// Holds the three queueable tiers (1..3) for one room.
#[derive(Default)]
pub struct RoomQueue {
    fast: Tier,
    default: Tier,
    deferred: Tier,
}

impl RoomQueue {
    fn tier_mut(&mut self, priority: Priority) -> &mut Tier {
        match priority {
            Priority::Immediate => unreachable!("immediate priority bypasses the queue"),
            Priority::Fast => &mut self.fast,
            Priority::Default => &mut self.default,
            Priority::Deferred => &mut self.deferred,
        }
    }

    fn total_messages(&self) -> usize {
        self.fast.messages.len() + self.default.messages.len() + self.deferred.messages.len()
    }

    fn total_bytes(&self) -> usize {
        self.fast.bytes + self.default.bytes + self.deferred.bytes
    }

    /// Enqueue `msg`. If this pushes the room over its caps, the single
    /// lowest-priority queued message is dropped to make room.
    pub fn enqueue(&mut self, msg: QueuedMessage) {
        let size = msg.payload.len();
        let priority = msg.priority;
        let tier = self.tier_mut(priority);
        tier.messages.push(msg);
        tier.bytes += size;

        while self.total_messages() > MAX_BATCH_MESSAGES || self.total_bytes() > MAX_BATCH_BYTES {
            if !self.drop_lowest_priority() {
                break;
            }
        }
    }

    fn drop_lowest_priority(&mut self) -> bool {
        for tier in [&mut self.deferred, &mut self.default, &mut self.fast] {
            if !tier.messages.is_empty() {
                let dropped = tier.messages.remove(0);
                tier.bytes -= dropped.payload.len();
                counter!(batcher_metrics::MESSAGES_DROPPED_TOTAL).increment(1);
                return true;
            }
        }
        false
    }

    /// Drain and return the queued messages for `priority`, oldest first.
    pub fn drain(&mut self, priority: Priority) -> Vec<QueuedMessage> {
        let tier = self.tier_mut(priority);
        tier.bytes = 0;
        std::mem::take(&mut tier.messages)
    }

    pub fn is_empty(&self) -> bool {
        self.total_messages() == 0
    }

    pub fn queue_depth(&self) -> usize {
        self.total_messages()
    }
}

/// A flushed group of messages ready for fan-out.
pub struct Batch {
    pub id: u64,
    pub messages: Vec<Vec<u8>>,
    pub avg_queue_time: Duration,
}

impl Batch {
    pub fn from_queued(id: u64, now: Instant, queued: Vec<QueuedMessage>) -> Self {
        let total: Duration = queued.iter().map(|m| now.duration_since(m.enqueued_at)).sum();
        let avg_queue_time = if queued.is_empty() { Duration::ZERO } else { total / queued.len() as u32 };
        Self { id, messages: queued.into_iter().map(|m| m.payload).collect(), avg_queue_time }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(priority: Priority, size: usize) -> QueuedMessage {
        QueuedMessage { payload: vec![0u8; size], priority, enqueued_at: Instant::now() }
    }

    #[test]
    fn overflow_drops_the_lowest_priority_message_first() {
        let mut queue = RoomQueue::default();
        for _ in 0..MAX_BATCH_MESSAGES {
            queue.enqueue(msg(Priority::Default, 1));
        }
        queue.enqueue(msg(Priority::Fast, 1));
        assert_eq!(queue.drain(Priority::Default).len(), MAX_BATCH_MESSAGES - 1);
        assert_eq!(queue.drain(Priority::Fast).len(), 1);
    }

    #[test]
    fn drain_resets_the_tier() {
        let mut queue = RoomQueue::default();
        queue.enqueue(msg(Priority::Fast, 10));
        assert_eq!(queue.drain(Priority::Fast).len(), 1);
        assert!(queue.drain(Priority::Fast).is_empty());
    }
}
