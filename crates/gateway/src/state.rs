//! Composition root: wires every backend crate together into the shared
//! state handed to connection tasks and HTTP handlers.

use std::{sync::Arc, time::Duration};

use gg_config::GatewayConfig;
use gg_discovery::ServiceRegistry;
use gg_dispatcher::MessageDispatcher;
use gg_queue::PriorityQueue;
use gg_routing::MessageRouter;
use gg_rpc::ChannelPool;
use gg_service_traits::Collaborators;
use gg_sessions::SessionStore;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{error::Result, pool::ConnectionPool};

/// Shared application state, composed once at startup and cloned around as
/// an `Arc`.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub id_gen: Arc<gg_common::IdGenerator>,
    pub router: Arc<MessageRouter>,
    pub queue: Arc<PriorityQueue>,
    pub channel_pool: Arc<ChannelPool>,
    pub dispatcher: Arc<MessageDispatcher>,
    pub sessions: Arc<SessionStore>,
    pub registry: Arc<ServiceRegistry>,
    pub collaborators: Arc<Collaborators>,
    pub pool: Arc<ConnectionPool>,
    pub metrics: gg_metrics::MetricsHandle,
}

impl GatewayState {
    /// Builds every collaborator from `config`, in dependency order: router
    /// and queue first (no dependencies), then the RPC transport pool,
    /// then the dispatcher and discovery registry that sit on top of it,
    /// then sessions and the connection pool.
    pub fn new(
        config: GatewayConfig,
        collaborators: Arc<Collaborators>,
        metrics: gg_metrics::MetricsHandle,
    ) -> Result<Arc<Self>> {
        let id_gen = Arc::new(gg_common::IdGenerator::new(0, 0)?);

        let router = Arc::new(MessageRouter::new(
            config.route_cache.max_size,
            Duration::from_secs(config.route_cache.ttl_secs),
        ));

        let queue = Arc::new(PriorityQueue::new(gg_queue::PriorityQueueConfig {
            max_size: config.queue.max_size,
            dedup_window_size: config.queue.dedup_window_size,
            dedup_ttl: Duration::from_secs(config.queue.dedup_ttl_secs),
            max_retries: config.batch.max_retries,
        }));

        let channel_pool = ChannelPool::new(gg_rpc::ChannelPoolConfig {
            min_connections: config.channel_pool.min_connections,
            max_connections: config.channel_pool.max_connections,
            health_check_interval: Duration::from_secs(config.channel_pool.health_check_interval_secs),
            max_failures: config.channel_pool.max_failures,
            connection_timeout: Duration::from_secs(config.channel_pool.connection_timeout_secs),
        });

        let circuit = gg_rpc::CircuitBreakerConfig {
            failure_threshold: config.circuit.failure_threshold,
            recovery_timeout: Duration::from_secs(config.circuit.recovery_timeout_secs),
            success_threshold: config.circuit.success_threshold,
            window_size: config.circuit.window_size,
        };
        let rpc_config = gg_rpc::RpcClientConfig {
            default_timeout: Duration::from_secs(config.rpc.default_timeout_secs),
            max_retries: config.rpc.max_retries,
            retry_delay: Duration::from_millis(config.rpc.retry_delay_ms),
            circuit_breaker: circuit,
        };

        let dispatcher = MessageDispatcher::new(
            Arc::clone(&queue),
            Arc::clone(&router),
            Arc::clone(&channel_pool),
            gg_dispatcher::DispatcherConfig {
                batch: gg_dispatcher::BatchConfig {
                    batch_size: config.batch.size,
                    timeout: Duration::from_millis(config.batch.timeout_ms),
                },
                dequeue_poll: Duration::from_secs(1),
                rpc: rpc_config,
            },
        );

        let registry = Arc::new(ServiceRegistry::new(
            Arc::clone(&collaborators.discovery),
            Arc::clone(&router),
            Arc::clone(&channel_pool),
            gg_discovery::DiscoveryConfig {
                refresh_interval: Duration::from_secs(config.discovery.refresh_interval_secs),
                health_check_interval: Duration::from_secs(config.discovery.health_check_interval_secs),
            },
        ));

        let sessions = SessionStore::new(
            gg_sessions::SessionStoreConfig {
                local_cache_size: config.session.local_cache_size,
                hot_threshold: config.session.hot_threshold,
                default_ttl: Duration::from_secs(config.session.default_ttl_secs),
                renewal_threshold: Duration::from_secs(config.session.renewal_threshold_secs),
                renewal_interval: Duration::from_secs(config.session.renewal_interval_secs),
                cleanup_interval: Duration::from_secs(config.session.cleanup_interval_secs),
                shared_ttl: Duration::from_secs(config.session.default_ttl_secs * 2),
            },
            Arc::clone(&collaborators.kv_store),
            Arc::clone(&id_gen),
        );

        let pool = ConnectionPool::new(crate::pool::PoolConfig::from(&config.pool));

        Ok(Arc::new(Self {
            config,
            id_gen,
            router,
            queue,
            channel_pool,
            dispatcher,
            sessions,
            registry,
            collaborators,
            pool,
            metrics,
        }))
    }

    /// Spawns every background task the gateway needs to function and
    /// returns their handles so shutdown can observe when they finish.
    pub fn spawn_background_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let service_names = self.config.discovery.service_names.clone();
        vec![
            tokio::spawn(Arc::clone(&self.dispatcher).run()),
            Arc::clone(&self.registry).spawn_refresh_loop(service_names.clone()),
            Arc::clone(&self.registry).spawn_health_check_loop(service_names),
            Arc::clone(&self.channel_pool).spawn_health_check_loop(),
            tokio::spawn(Arc::clone(&self.sessions).run_auto_renewal()),
            tokio::spawn(Arc::clone(&self.sessions).run_cleanup()),
            Arc::clone(&self.pool).spawn_cleanup_loop(),
        ]
    }

    /// Ordered drain: stop admitting new work before tearing down the
    /// components that still-open connections depend on.
    pub async fn shutdown(&self, tasks: Vec<JoinHandle<()>>) {
        info!("gateway shutdown: draining priority queue");
        let drain_deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while self.queue.size() > 0 && tokio::time::Instant::now() < drain_deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        info!(remaining = self.queue.size(), "gateway shutdown: stopping background tasks");
        for task in tasks {
            task.abort();
        }

        info!("gateway shutdown complete");
    }
}
