//! Per-target batching: messages destined for the same backend instance
//! are accumulated and flushed together, whichever comes first of a size
//! threshold or an idle timer started on the first message since the last
//! flush.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use gg_queue::QueuedMessage;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { batch_size: 100, timeout: Duration::from_millis(10) }
    }
}

/// Receives flushed batches for one target. Implemented by the dispatcher
/// so the processor task doesn't need to know how a batch gets sent.
#[async_trait::async_trait]
pub trait BatchSink: Send + Sync {
    async fn send_batch(&self, target: &str, batch: Vec<QueuedMessage>);
}

type SinkFn = dyn Fn(String, Vec<QueuedMessage>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync;

/// One background task per target, fed through an unbounded channel.
///
/// Mirrors the double-triggered flush of a size-bound buffer racing an
/// idle timeout, implemented here as a `tokio::select!` between the next
/// inbound message and a timer that only runs while the buffer is
/// non-empty.
pub struct BatchProcessor {
    tx: mpsc::UnboundedSender<QueuedMessage>,
    buffer_len: Arc<AtomicUsize>,
}

impl BatchProcessor {
    pub fn spawn(target: String, config: BatchConfig, sink: Arc<dyn BatchSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let buffer_len = Arc::new(AtomicUsize::new(0));
        let task_buffer_len = buffer_len.clone();

        tokio::spawn(async move {
            Self::run(target, config, sink, rx, task_buffer_len).await;
        });

        Self { tx, buffer_len }
    }

    /// Test/internal constructor taking a plain flush callback instead of a
    /// `BatchSink` object, so unit tests don't need to stand up a fake RPC
    /// client just to exercise the flush triggers.
    fn spawn_with_fn(target: String, config: BatchConfig, flush: Arc<SinkFn>) -> Self {
        struct FnSink(Arc<SinkFn>);

        #[async_trait::async_trait]
        impl BatchSink for FnSink {
            async fn send_batch(&self, target: &str, batch: Vec<QueuedMessage>) {
                (self.0)(target.to_string(), batch).await;
            }
        }

        Self::spawn(target, config, Arc::new(FnSink(flush)))
    }

    async fn run(
        target: String,
        config: BatchConfig,
        sink: Arc<dyn BatchSink>,
        mut rx: mpsc::UnboundedReceiver<QueuedMessage>,
        buffer_len: Arc<AtomicUsize>,
    ) {
        let mut buffer: Vec<QueuedMessage> = Vec::with_capacity(config.batch_size);
        let timer = tokio::time::sleep(config.timeout);
        tokio::pin!(timer);
        let mut timer_armed = false;

        loop {
            tokio::select! {
                biased;

                maybe_msg = rx.recv() => {
                    match maybe_msg {
                        Some(msg) => {
                            buffer.push(msg);
                            buffer_len.store(buffer.len(), Ordering::Relaxed);

                            if buffer.len() == 1 {
                                timer.as_mut().reset(tokio::time::Instant::now() + config.timeout);
                                timer_armed = true;
                            }

                            if buffer.len() >= config.batch_size {
                                timer_armed = false;
                                Self::flush(&target, &sink, &mut buffer, &buffer_len).await;
                            }
                        }
                        None => break,
                    }
                }

                () = &mut timer, if timer_armed => {
                    timer_armed = false;
                    Self::flush(&target, &sink, &mut buffer, &buffer_len).await;
                }
            }
        }

        if !buffer.is_empty() {
            Self::flush(&target, &sink, &mut buffer, &buffer_len).await;
        }
    }

    async fn flush(target: &str, sink: &Arc<dyn BatchSink>, buffer: &mut Vec<QueuedMessage>, buffer_len: &AtomicUsize) {
        let batch = std::mem::take(buffer);
        buffer_len.store(0, Ordering::Relaxed);
        sink.send_batch(target, batch).await;
    }

    /// Enqueue a message for this target's batch. Returns `false` if the
    /// processor task has already shut down.
    pub fn enqueue(&self, msg: QueuedMessage) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer_len.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use gg_protocol::ClientEnvelope;
    use gg_queue::Priority;

    use super::*;

    fn msg(msg_id: i64) -> QueuedMessage {
        QueuedMessage::new(ClientEnvelope::new("frame", serde_json::json!({"msg_id": msg_id}), 0), Priority::Normal, 3)
    }

    #[tokio::test]
    async fn flushes_on_size_threshold() {
        let flushed: Arc<Mutex<Vec<Vec<i64>>>> = Arc::new(Mutex::new(Vec::new()));
        let flushed_task = flushed.clone();
        let flush: Arc<SinkFn> = Arc::new(move |_target, batch: Vec<QueuedMessage>| {
            let flushed = flushed_task.clone();
            Box::pin(async move {
                let ids: Vec<i64> = batch.iter().filter_map(|m| m.envelope.msg_id()).collect();
                flushed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(ids);
            })
        });

        let processor = BatchProcessor::spawn_with_fn(
            "logic-1".to_string(),
            BatchConfig { batch_size: 2, timeout: Duration::from_secs(10) },
            flush,
        );

        assert!(processor.enqueue(msg(1001)));
        assert!(processor.enqueue(msg(1002)));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let batches = flushed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        assert_eq!(batches, vec![vec![1001, 1002]]);
    }

    #[tokio::test]
    async fn flushes_on_timeout_with_partial_batch() {
        let flushed: Arc<Mutex<Vec<Vec<i64>>>> = Arc::new(Mutex::new(Vec::new()));
        let flushed_task = flushed.clone();
        let flush: Arc<SinkFn> = Arc::new(move |_target, batch: Vec<QueuedMessage>| {
            let flushed = flushed_task.clone();
            Box::pin(async move {
                let ids: Vec<i64> = batch.iter().filter_map(|m| m.envelope.msg_id()).collect();
                flushed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(ids);
            })
        });

        let processor = BatchProcessor::spawn_with_fn(
            "logic-1".to_string(),
            BatchConfig { batch_size: 100, timeout: Duration::from_millis(20) },
            flush,
        );

        assert!(processor.enqueue(msg(2001)));
        tokio::time::sleep(Duration::from_millis(60)).await;

        let batches = flushed.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        assert_eq!(batches, vec![vec![2001]]);
    }

    #[tokio::test]
    async fn buffered_len_reflects_pending_messages() {
        let flush: Arc<SinkFn> = Arc::new(|_target, _batch| Box::pin(async {}));
        let processor = BatchProcessor::spawn_with_fn(
            "logic-1".to_string(),
            BatchConfig { batch_size: 100, timeout: Duration::from_secs(10) },
            flush,
        );

        processor.enqueue(msg(1001));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(processor.buffered_len(), 1);
    }
}
