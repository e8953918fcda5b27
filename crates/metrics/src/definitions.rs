//! Metric name and label definitions.
//!
//! Centralizes every metric name the gateway emits so producers and the
//! `/stats` snapshot reducer agree on spelling.

/// HTTP observability-surface metrics (`/health`, `/stats`, `/routing/stats`).
pub mod http {
    pub const REQUESTS_TOTAL: &str = "gateway_http_requests_total";
    pub const REQUEST_DURATION_SECONDS: &str = "gateway_http_request_duration_seconds";
    pub const REQUESTS_IN_FLIGHT: &str = "gateway_http_requests_in_flight";
}

/// Connection object and connection pool metrics.
pub mod websocket {
    pub const CONNECTIONS_TOTAL: &str = "gateway_websocket_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "gateway_websocket_connections_active";
    pub const CONNECTIONS_REJECTED_TOTAL: &str = "gateway_websocket_connections_rejected_total";
    pub const MESSAGES_RECEIVED_TOTAL: &str = "gateway_websocket_messages_received_total";
    pub const MESSAGES_SENT_TOTAL: &str = "gateway_websocket_messages_sent_total";
    pub const READ_QUEUE_DROPPED_TOTAL: &str = "gateway_websocket_read_queue_dropped_total";
    pub const CLOSE_TOTAL: &str = "gateway_websocket_close_total";
}

/// Connection pool state.
pub mod pool {
    pub const ACTIVE: &str = "gateway_pool_active";
    pub const IDLE: &str = "gateway_pool_idle";
    pub const SHELL_HITS_TOTAL: &str = "gateway_pool_shell_hits_total";
    pub const SHELL_MISSES_TOTAL: &str = "gateway_pool_shell_misses_total";
    pub const CLEANUP_RELEASED_TOTAL: &str = "gateway_pool_cleanup_released_total";
    /// Labelled `state="ready|degraded|overloaded"`, value always 1 for the current state.
    pub const STATE: &str = "gateway_pool_state";
}

/// Heartbeat loop.
pub mod heartbeat {
    pub const SENT_TOTAL: &str = "gateway_heartbeat_sent_total";
    pub const TIMEOUTS_TOTAL: &str = "gateway_heartbeat_timeouts_total";
}

/// Session store metrics.
pub mod session {
    pub const CREATED_TOTAL: &str = "gateway_sessions_created_total";
    pub const REMOVED_TOTAL: &str = "gateway_sessions_removed_total";
    pub const ACTIVE_LOCAL: &str = "gateway_sessions_active_local";
    pub const AUTHENTICATED_TOTAL: &str = "gateway_sessions_authenticated_total";
    pub const EXPIRED_CLEANED_TOTAL: &str = "gateway_sessions_expired_cleaned_total";
    pub const RENEWED_TOTAL: &str = "gateway_sessions_renewed_total";
}

/// Priority queue and back-pressure controller.
pub mod queue {
    pub const ENQUEUED_TOTAL: &str = "gateway_queue_enqueued_total";
    pub const DEQUEUED_TOTAL: &str = "gateway_queue_dequeued_total";
    pub const DROPPED_TOTAL: &str = "gateway_queue_dropped_total";
    pub const THROTTLED_TOTAL: &str = "gateway_queue_throttled_total";
    pub const DUPLICATE_TOTAL: &str = "gateway_queue_duplicate_total";
    pub const SIZE: &str = "gateway_queue_size";
    pub const RETRIED_TOTAL: &str = "gateway_queue_retried_total";
}

/// Message router and route cache.
pub mod router {
    pub const RESOLUTIONS_TOTAL: &str = "gateway_router_resolutions_total";
    pub const RESOLUTION_DURATION_SECONDS: &str = "gateway_router_resolution_duration_seconds";
    pub const UNKNOWN_MESSAGE_ID_TOTAL: &str = "gateway_router_unknown_message_id_total";
    pub const NO_HEALTHY_INSTANCE_TOTAL: &str = "gateway_router_no_healthy_instance_total";
    pub const FAILOVERS_TOTAL: &str = "gateway_router_failovers_total";
    pub const CACHE_HITS_TOTAL: &str = "gateway_router_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "gateway_router_cache_misses_total";
}

/// Batch dispatcher.
pub mod dispatcher {
    pub const BATCHES_SENT_TOTAL: &str = "gateway_dispatcher_batches_sent_total";
    pub const BATCH_SIZE: &str = "gateway_dispatcher_batch_size";
    pub const MESSAGES_SUCCEEDED_TOTAL: &str = "gateway_dispatcher_messages_succeeded_total";
    pub const MESSAGES_FAILED_TOTAL: &str = "gateway_dispatcher_messages_failed_total";
    pub const MESSAGES_DROPPED_TOTAL: &str = "gateway_dispatcher_messages_dropped_total";
    pub const RETRIES_TOTAL: &str = "gateway_dispatcher_retries_total";
}

/// RPC client and transport pool.
pub mod rpc {
    pub const CALLS_TOTAL: &str = "gateway_rpc_calls_total";
    pub const CALL_DURATION_SECONDS: &str = "gateway_rpc_call_duration_seconds";
    pub const CALL_ERRORS_TOTAL: &str = "gateway_rpc_call_errors_total";
    pub const RETRIES_TOTAL: &str = "gateway_rpc_retries_total";
    pub const CHANNEL_POOL_READY: &str = "gateway_rpc_channel_pool_ready";
    pub const CHANNEL_POOL_TRANSIENT_FAILURE: &str =
        "gateway_rpc_channel_pool_transient_failure";
    pub const CHANNELS_RECREATED_TOTAL: &str = "gateway_rpc_channels_recreated_total";
}

/// Circuit breaker.
pub mod circuit {
    pub const OPENS_TOTAL: &str = "gateway_circuit_opens_total";
    pub const CLOSES_TOTAL: &str = "gateway_circuit_closes_total";
    pub const HALF_OPENS_TOTAL: &str = "gateway_circuit_half_opens_total";
    pub const REJECTED_TOTAL: &str = "gateway_circuit_rejected_total";
}

/// Service discovery.
pub mod discovery {
    pub const REFRESH_TOTAL: &str = "gateway_discovery_refresh_total";
    pub const HEALTH_CHECKS_TOTAL: &str = "gateway_discovery_health_checks_total";
    pub const INSTANCES_HEALTHY: &str = "gateway_discovery_instances_healthy";
    pub const INSTANCES_UNHEALTHY: &str = "gateway_discovery_instances_unhealthy";
}

/// System/runtime metrics.
pub mod system {
    pub const UPTIME_SECONDS: &str = "gateway_uptime_seconds";
    pub const BUILD_INFO: &str = "gateway_build_info";
}

/// Common/shared metrics.
pub mod common {
    pub const ERRORS_TOTAL: &str = "gateway_errors_total";
}

/// Common label keys used across metrics.
pub mod labels {
    pub const SERVICE: &str = "service";
    pub const TARGET: &str = "target";
    pub const PRIORITY: &str = "priority";
    pub const REASON: &str = "reason";
    pub const STATE: &str = "state";
    pub const ERROR_TYPE: &str = "error_type";
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
}

/// Standard histogram buckets for different metric types.
pub mod buckets {
    use once_cell::sync::Lazy;

    /// HTTP/WS request duration buckets (in seconds). Covers 1ms to 60s.
    pub static HTTP_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// RPC call duration buckets (in seconds). Covers 1ms to 30s.
    pub static RPC_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]
    });

    /// Queue size buckets. Covers 1 to 10000.
    pub static QUEUE_SIZE: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 10000.0,
        ]
    });

    /// Batch size buckets. Covers 1 to `batch.size` defaults.
    pub static BATCH_SIZE: Lazy<Vec<f64>> =
        Lazy::new(|| vec![1.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0]);
}
