//! Priority message queue: heap + back-pressure + dedup, shared by a
//! mutex-guarded heap and a `Notify` for async dequeuers.

use std::{collections::BinaryHeap, time::Duration};

use gg_protocol::ClientEnvelope;
use tokio::sync::Notify;
use tracing::debug;

use crate::{
    backpressure::{Admission, BackpressureController},
    dedup::DedupWindow,
    error::{Error, Result},
    message::QueuedMessage,
    priority::Priority,
};

pub struct PriorityQueueConfig {
    pub max_size: usize,
    pub dedup_window_size: usize,
    pub dedup_ttl: Duration,
    pub max_retries: u32,
}

impl Default for PriorityQueueConfig {
    fn default() -> Self {
        Self { max_size: 10_000, dedup_window_size: 10_000, dedup_ttl: Duration::from_secs(60), max_retries: 3 }
    }
}

pub struct PriorityQueue {
    heap: parking_lot::Mutex<BinaryHeap<QueuedMessage>>,
    notify: Notify,
    backpressure: BackpressureController,
    dedup: DedupWindow,
    max_retries: u32,
}

impl PriorityQueue {
    pub fn new(config: PriorityQueueConfig) -> Self {
        Self {
            heap: parking_lot::Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            backpressure: BackpressureController::new(config.max_size),
            dedup: DedupWindow::new(config.dedup_window_size, config.dedup_ttl),
            max_retries: config.max_retries,
        }
    }

    /// Admit a business envelope into the queue at the given priority.
    ///
    /// Rejections are distinguished (`QueueFull` for back-pressure,
    /// `Duplicate` for the dedup window) so the caller can reply with the
    /// right client-facing error code.
    pub fn enqueue(&self, envelope: ClientEnvelope, priority: Priority) -> Result<()> {
        if let (Some(msg_id), Some(sequence)) = (envelope.msg_id(), envelope.sequence()) {
            let player_id = envelope.player_id().unwrap_or_default();
            let fingerprint = DedupWindow::fingerprint(msg_id, &sequence, &player_id);
            if self.dedup.check_and_insert(fingerprint) {
                return Err(Error::Duplicate);
            }
        }

        let current_size = self.size();
        match self.backpressure.admit(priority, current_size) {
            Admission::Dropped | Admission::Throttled => Err(Error::QueueFull),
            Admission::Accept => {
                self.heap.lock().push(QueuedMessage::new(envelope, priority, self.max_retries));
                self.notify.notify_one();
                Ok(())
            },
        }
    }

    /// Wait up to `timeout` for a message to become available.
    pub async fn dequeue(&self, timeout: Duration) -> Option<QueuedMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(msg) = self.heap.lock().pop() {
                return Some(msg);
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            if tokio::time::timeout(remaining, self.notify.notified()).await.is_err() {
                return None;
            }
        }
    }

    /// Re-enter a message that failed delivery. Returns `false` once its
    /// retry budget is exhausted instead of re-enqueuing.
    pub fn retry(&self, msg: QueuedMessage) -> bool {
        if msg.exhausted() {
            debug!(retry_count = msg.retry_count, "message exhausted retry budget, dropping");
            return false;
        }
        let retried = msg.retried();
        self.heap.lock().push(retried);
        self.notify.notify_one();
        true
    }

    pub fn size(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn clear(&self) {
        self.heap.lock().clear();
    }

    pub fn is_throttling(&self) -> bool {
        self.backpressure.is_throttling()
    }

    pub fn dropped_count(&self) -> u64 {
        self.backpressure.dropped_count()
    }

    pub fn throttled_count(&self) -> u64 {
        self.backpressure.throttled_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(msg_id: i64, sequence: &str) -> ClientEnvelope {
        ClientEnvelope::new("frame", serde_json::json!({"msg_id": msg_id, "sequence": sequence, "player_id": "p1"}), 0)
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_roundtrips() {
        let queue = PriorityQueue::new(PriorityQueueConfig::default());
        queue.enqueue(envelope(1001, "s1"), Priority::Normal).unwrap();
        let msg = queue.dequeue(Duration::from_millis(100)).await.unwrap();
        assert_eq!(msg.envelope.msg_id(), Some(1001));
    }

    #[tokio::test]
    async fn dequeue_times_out_on_empty_queue() {
        let queue = PriorityQueue::new(PriorityQueueConfig::default());
        let result = queue.dequeue(Duration::from_millis(20)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn higher_priority_dequeues_first() {
        let queue = PriorityQueue::new(PriorityQueueConfig::default());
        queue.enqueue(envelope(1001, "low"), Priority::Low).unwrap();
        queue.enqueue(envelope(1002, "critical"), Priority::Critical).unwrap();
        queue.enqueue(envelope(1003, "normal"), Priority::Normal).unwrap();

        let first = queue.dequeue(Duration::from_millis(100)).await.unwrap();
        assert_eq!(first.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_rejected() {
        let queue = PriorityQueue::new(PriorityQueueConfig::default());
        queue.enqueue(envelope(1001, "seq-a"), Priority::Normal).unwrap();
        let err = queue.enqueue(envelope(1001, "seq-a"), Priority::Normal).unwrap_err();
        assert!(matches!(err, Error::Duplicate));
    }

    #[tokio::test]
    async fn queue_full_rejects_low_priority_past_drop_threshold() {
        let config = PriorityQueueConfig { max_size: 10, ..PriorityQueueConfig::default() };
        let queue = PriorityQueue::new(config);
        for i in 0..10 {
            let _ = queue.enqueue(envelope(1000 + i, &format!("seq-{i}")), Priority::Normal);
        }
        let err = queue.enqueue(envelope(2000, "overflow"), Priority::Normal).unwrap_err();
        assert!(matches!(err, Error::QueueFull));
    }

    #[tokio::test]
    async fn retry_requeues_until_budget_exhausted() {
        let queue = PriorityQueue::new(PriorityQueueConfig::default());
        let mut msg = QueuedMessage::new(envelope(1001, "s1"), Priority::Normal, 1);
        assert!(queue.retry(msg.clone()));
        msg = msg.retried();
        assert!(!queue.retry(msg));
    }

    #[tokio::test]
    async fn clear_empties_the_queue() {
        let queue = PriorityQueue::new(PriorityQueueConfig::default());
        queue.enqueue(envelope(1001, "s1"), Priority::Normal).unwrap();
        queue.clear();
        assert_eq!(queue.size(), 0);
    }
}
