//! Dequeues from the priority queue, resolves a target instance through
//! the router, and forwards to that target's batch processor. Batches are
//! sent to the backend over one streaming RPC call per flush; individual
//! failures are retried through the queue until the message's retry
//! budget is exhausted.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use gg_protocol::RpcRequest;
use gg_queue::{PriorityQueue, QueuedMessage};
use gg_routing::MessageRouter;
use gg_rpc::{ChannelPool, RpcClient, RpcClientConfig};
use tracing::{debug, warn};

use crate::{
    batch::{BatchConfig, BatchProcessor, BatchSink},
    stats::{DispatchFailureReason, DispatchStats, DispatchStatsSnapshot},
};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub batch: BatchConfig,
    pub dequeue_poll: Duration,
    pub rpc: RpcClientConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { batch: BatchConfig::default(), dequeue_poll: Duration::from_secs(1), rpc: RpcClientConfig::default() }
    }
}

/// Routes and batches business messages toward backend service instances.
///
/// One [`BatchProcessor`] is kept per resolved `host:port` target rather
/// than per service name: two players routed to different instances of the
/// same service must not wait on each other's batch.
pub struct MessageDispatcher {
    queue: Arc<PriorityQueue>,
    router: Arc<MessageRouter>,
    channel_pool: Arc<ChannelPool>,
    config: DispatcherConfig,
    processors: DashMap<String, Arc<BatchProcessor>>,
    /// Target `host:port` → the resolved service name last routed to it,
    /// so `send_batch` can build an `RpcRequest` without re-routing.
    service_names: DashMap<String, String>,
    /// One `RpcClient` (and its circuit breaker) per target, reused across
    /// batches so failure history actually accumulates.
    clients: DashMap<String, Arc<RpcClient>>,
    stats: DispatchStats,
}

impl MessageDispatcher {
    #[must_use]
    pub fn new(queue: Arc<PriorityQueue>, router: Arc<MessageRouter>, channel_pool: Arc<ChannelPool>, config: DispatcherConfig) -> Arc<Self> {
        Arc::new(Self {
            queue,
            router,
            channel_pool,
            config,
            processors: DashMap::new(),
            service_names: DashMap::new(),
            clients: DashMap::new(),
            stats: DispatchStats::default(),
        })
    }

    /// Runs until the queue is dropped; intended to be spawned as a
    /// background task at startup.
    pub async fn run(self: Arc<Self>) {
        loop {
            if let Some(msg) = self.queue.dequeue(self.config.dequeue_poll).await {
                self.dispatch_one(msg).await;
            }
        }
    }

    async fn dispatch_one(self: &Arc<Self>, msg: QueuedMessage) {
        self.stats.record_dispatched();

        let Some(msg_id) = msg.envelope.msg_id() else {
            self.stats.record_failure(DispatchFailureReason::RouteFailed);
            debug!("dropping message with no msg_id, cannot route");
            return;
        };
        let player_id = msg.envelope.player_id().unwrap_or_default();

        match self.router.route(msg_id, &player_id) {
            Ok((service_name, instance)) => {
                let target = instance.address();
                self.service_names.insert(target.clone(), service_name);
                let processor = self.processor_for(&target);
                if !processor.enqueue(msg) {
                    self.stats.record_failure(DispatchFailureReason::NoClient);
                    warn!(%target, "batch processor channel closed, message dropped");
                }
            },
            Err(err) => {
                self.stats.record_failure(DispatchFailureReason::RouteFailed);
                debug!(%err, msg_id, "routing failed, retrying via queue");
                self.handle_dispatch_failure(msg);
            },
        }
    }

    fn processor_for(self: &Arc<Self>, target: &str) -> Arc<BatchProcessor> {
        self.processors
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(BatchProcessor::spawn(target.to_string(), self.config.batch.clone(), self.clone() as Arc<dyn BatchSink>)))
            .clone()
    }

    fn client_for(&self, target: &str) -> Arc<RpcClient> {
        self.clients
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(RpcClient::new(target.to_string(), self.channel_pool.clone(), self.config.rpc.clone())))
            .clone()
    }

    /// Re-enters a failed message into the priority queue, counting it as
    /// exhausted when the retry budget runs out instead of as a fresh
    /// failure.
    fn handle_dispatch_failure(&self, msg: QueuedMessage) {
        if self.queue.retry(msg) {
            self.stats.record_retry();
        } else {
            self.stats.record_failure(DispatchFailureReason::MaxRetriesExceeded);
        }
    }

    pub fn dispatch_stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }
}

#[async_trait::async_trait]
impl BatchSink for MessageDispatcher {
    async fn send_batch(&self, target: &str, batch: Vec<QueuedMessage>) {
        if batch.is_empty() {
            return;
        }
        self.stats.record_batch_sent();

        let client = self.client_for(target);
        let service_name = self.service_names.get(target).map(|s| s.clone()).unwrap_or_default();
        let requests: Vec<RpcRequest> = batch
            .iter()
            .map(|m| {
                let payload = serde_json::to_vec(&m.envelope).unwrap_or_default();
                RpcRequest::new(service_name.clone(), "HandleMessage", payload)
            })
            .collect();

        let timeout = self.config.rpc.default_timeout * u32::try_from(batch.len().max(1)).unwrap_or(u32::MAX);
        match client.stream_call(requests, timeout).await {
            Ok(responses) => {
                for (msg, response) in batch.into_iter().zip(responses) {
                    if response.is_ok() {
                        self.stats.record_success();
                    } else {
                        self.stats.record_failure(DispatchFailureReason::TransportError);
                        self.handle_dispatch_failure(msg);
                    }
                }
            },
            Err(err) => {
                let reason = classify_rpc_error(&err);
                warn!(target, error = %err, batch_size = batch.len(), "batch dispatch failed");
                for msg in batch {
                    self.stats.record_failure(reason);
                    self.handle_dispatch_failure(msg);
                }
            },
        }
    }
}

fn classify_rpc_error(err: &gg_rpc::Error) -> DispatchFailureReason {
    match err {
        gg_rpc::Error::CircuitOpen(_) => DispatchFailureReason::CircuitOpen,
        gg_rpc::Error::Timeout(_) => DispatchFailureReason::Timeout,
        _ => DispatchFailureReason::TransportError,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gg_queue::PriorityQueueConfig;
    use gg_service_traits::ServiceInstance;

    use super::*;

    fn dispatcher() -> (Arc<MessageDispatcher>, Arc<PriorityQueue>, Arc<MessageRouter>) {
        let queue = Arc::new(PriorityQueue::new(PriorityQueueConfig::default()));
        let router = Arc::new(MessageRouter::new(100, Duration::from_secs(60)));
        let pool = ChannelPool::new(gg_rpc::ChannelPoolConfig { min_connections: 0, ..gg_rpc::ChannelPoolConfig::default() });
        let dispatcher = MessageDispatcher::new(queue.clone(), router.clone(), pool, DispatcherConfig::default());
        (dispatcher, queue, router)
    }

    #[tokio::test]
    async fn unroutable_msg_id_is_counted_as_route_failure_and_dropped() {
        let (dispatcher, queue, _router) = dispatcher();
        let msg = QueuedMessage::new(gg_protocol::ClientEnvelope::new("frame", serde_json::json!({"msg_id": 1001}), 0), gg_queue::Priority::Normal, 1);
        queue.enqueue(msg.envelope.clone(), msg.priority).unwrap();

        let dequeued = queue.dequeue(Duration::from_millis(100)).await.unwrap();
        dispatcher.dispatch_one(dequeued).await;

        let stats = dispatcher.dispatch_stats();
        assert_eq!(stats.route_failed, 1);
        assert_eq!(stats.total_dispatched, 1);
    }

    #[tokio::test]
    async fn routed_message_reaches_its_targets_batch_processor() {
        let (dispatcher, queue, router) = dispatcher();
        router.register_instance("logic", ServiceInstance::new("logic-1", "127.0.0.1", 9500));

        let envelope = gg_protocol::ClientEnvelope::new("frame", serde_json::json!({"msg_id": 1001, "player_id": "p1"}), 0);
        queue.enqueue(envelope, gg_queue::Priority::Normal).unwrap();

        let dequeued = queue.dequeue(Duration::from_millis(100)).await.unwrap();
        dispatcher.dispatch_one(dequeued).await;

        assert_eq!(dispatcher.processors.len(), 1);
        let stats = dispatcher.dispatch_stats();
        assert_eq!(stats.route_failed, 0);
    }
}
