//! HTTP surface: health/stats endpoints, the WebSocket upgrade route, the
//! middleware stack, and the serve loop with its ordered shutdown.
//!
//! Layer order mirrors the stack every long-lived service in this codebase
//! applies (outermost → innermost for requests):
//! 1. `CatchPanicLayer` — converts handler panics to 500s
//! 2. `SetSensitiveHeadersLayer` — marks Authorization/Cookie as redacted
//! 3. `SetRequestIdLayer` — generates x-request-id before tracing
//! 4. `TraceLayer` (optional) — logs requests with redacted headers
//! 5. `CorsLayer`
//! 6. `PropagateRequestIdLayer` — copies x-request-id to the response
//! 7. Security response headers
//! 8. `RequestBodyLimitLayer`
//! 9. `CompressionLayer` (innermost)

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderValue, Level},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveHeadersLayer,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::info;

use crate::{state::GatewayState, ws};

const REQUEST_BODY_LIMIT: usize = 2 * 1024 * 1024;

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

fn apply_middleware_stack(router: Router, cors: CorsLayer, http_request_logs: bool) -> Router {
    let router = router
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(REQUEST_BODY_LIMIT))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("deny"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors);

    let router = apply_http_trace_layer(router, http_request_logs);

    router
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            header::SET_COOKIE,
        ]))
        .layer(CatchPanicLayer::new())
}

fn apply_http_trace_layer(router: Router, enabled: bool) -> Router {
    if !enabled {
        return router;
    }
    let trace = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_owned();
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));
    router.layer(trace)
}

pub fn build_app(state: Arc<GatewayState>, http_request_logs: bool) -> Router {
    let cors = build_cors_layer();

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/routing/stats", get(routing_stats_handler))
        .route("/metrics", get(metrics_handler))
        .route("/admin/shutdown", post(shutdown_handler))
        .route("/ws", get(ws::upgrade))
        .with_state(state);

    apply_middleware_stack(router, cors, http_request_logs)
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.pool.stats().active,
    }))
}

async fn stats_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let pool = state.pool.stats();
    let dispatch = state.dispatcher.dispatch_stats();
    let sessions = state.sessions.stats();

    Json(serde_json::json!({
        "pool": {
            "active": pool.active,
            "max_concurrent": pool.max_concurrent,
            "idle_evicted_total": pool.idle_evicted_total,
        },
        "queue": {
            "size": state.queue.size(),
            "is_throttling": state.queue.is_throttling(),
            "dropped": state.queue.dropped_count(),
            "throttled": state.queue.throttled_count(),
        },
        "dispatch": {
            "total_dispatched": dispatch.total_dispatched,
            "successful": dispatch.successful,
            "failed": dispatch.failed,
            "retried": dispatch.retried,
            "batches_sent": dispatch.batches_sent,
            "route_failed": dispatch.route_failed,
            "no_client": dispatch.no_client,
            "transport_error": dispatch.transport_error,
            "timed_out": dispatch.timed_out,
            "circuit_open": dispatch.circuit_open,
            "max_retries_exceeded": dispatch.max_retries_exceeded,
        },
        "sessions": {
            "local_sessions": sessions.local_sessions,
            "created": sessions.created,
            "removed": sessions.removed,
            "expired_cleaned": sessions.expired_cleaned,
            "renewed": sessions.renewed,
        },
    }))
}

async fn routing_stats_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let stats = state.router.stats();
    let cache = state.router.route_cache_stats();
    Json(serde_json::json!({
        "total_routes": stats.total_routes,
        "cache_hits": stats.cache_hits,
        "cache_misses": stats.cache_misses,
        "failed_routes": stats.failed_routes,
        "cache": {
            "total_entries": cache.total_entries,
            "active_entries": cache.active_entries,
            "max_size": cache.max_size,
            "hits": cache.hits,
            "misses": cache.misses,
        },
    }))
}

async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"))],
        state.metrics.render(),
    )
}

async fn shutdown_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "shutdown scheduled" }))
}

/// Binds `addr`, serves the app, and runs the ordered drain sequence once
/// ctrl-c is received — stop accepting, drain the dispatcher, then tear
/// down discovery/pool/session background tasks.
pub async fn serve(state: Arc<GatewayState>, http_request_logs: bool) -> crate::error::Result<()> {
    let addr: SocketAddr = state.config.bind.parse().map_err(|_| {
        crate::error::Error::Message(format!("invalid bind address {:?}", state.config.bind))
    })?;

    let tasks = state.spawn_background_tasks();
    let app = build_app(Arc::clone(&state), http_request_logs);

    let shutdown_state = Arc::clone(&state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("ctrl-c received, shutting down");
        shutdown_state.shutdown(tasks).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::process::exit(0);
    });

    info!(%addr, "gg-gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
