//! The unit of work carried through the priority queue.

use std::cmp::Ordering;

use gg_protocol::ClientEnvelope;

use crate::priority::Priority;

#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub envelope: ClientEnvelope,
    pub priority: Priority,
    pub enqueue_ts: std::time::Instant,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl QueuedMessage {
    pub fn new(envelope: ClientEnvelope, priority: Priority, max_retries: u32) -> Self {
        Self { envelope, priority, enqueue_ts: std::time::Instant::now(), retry_count: 0, max_retries }
    }

    pub fn exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Re-enter the queue with a fresh timestamp, losing FIFO position
    /// relative to peers that haven't retried.
    pub fn retried(mut self) -> Self {
        self.retry_count += 1;
        self.enqueue_ts = std::time::Instant::now();
        self
    }
}

/// Strict priority order, lower `Priority` first; FIFO by `enqueue_ts`
/// within a priority. `BinaryHeap` is a max-heap, so this implementation is
/// inverted: the message that should dequeue first compares as `Greater`.
impl Ord for QueuedMessage {
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority).then_with(|| other.enqueue_ts.cmp(&self.enqueue_ts))
    }
}

impl PartialOrd for QueuedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.enqueue_ts == other.enqueue_ts
    }
}

impl Eq for QueuedMessage {}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(priority: Priority) -> QueuedMessage {
        QueuedMessage::new(ClientEnvelope::new("frame", serde_json::json!({}), 0), priority, 3)
    }

    #[test]
    fn higher_priority_message_sorts_greater_for_max_heap() {
        let critical = msg(Priority::Critical);
        let low = msg(Priority::Low);
        assert!(critical > low);
    }

    #[test]
    fn earlier_enqueue_wins_within_same_priority() {
        let first = msg(Priority::Normal);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = msg(Priority::Normal);
        assert!(first > second);
    }

    #[test]
    fn retried_message_loses_fifo_position() {
        let original = msg(Priority::Normal);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let other = msg(Priority::Normal);
        let retried = original.retried();
        assert!(other > retried);
        assert_eq!(retried.retry_count, 1);
    }
}
