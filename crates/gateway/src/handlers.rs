//! Inbound message handling: classify, authenticate, and either answer a
//! frame locally (system/gateway traffic) or hand it to the priority queue
//! for the dispatcher to forward.

use std::sync::Arc;

use gg_protocol::{classify, error_codes, ClientEnvelope, EnvelopeKind};
use gg_queue::Priority;

use crate::{connection::OutboundFrame, state::GatewayState};

type OutboundSender = crate::connection::OutboundSender;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn reply(outbound_tx: &OutboundSender, r#type: &str, data: serde_json::Value) {
    let frame = ClientEnvelope::new(r#type, data, now_ms());
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = outbound_tx.try_send(OutboundFrame::Text(text));
    }
}

fn reply_error(outbound_tx: &OutboundSender, error_code: &str, message: impl Into<String>) {
    reply(
        outbound_tx,
        "error",
        serde_json::json!({ "error_code": error_code, "message": message.into() }),
    );
}

fn reply_auth_failed(outbound_tx: &OutboundSender, error_code: &str, message: impl Into<String>) {
    reply(
        outbound_tx,
        "auth_response",
        serde_json::json!({ "success": false, "error_code": error_code, "message": message.into() }),
    );
}

/// Entry point called by the read loop for every decoded frame. Never lets
/// a single bad or unroutable frame tear down the connection.
pub async fn handle_envelope(
    state: &Arc<GatewayState>,
    session_id: u64,
    envelope: ClientEnvelope,
    outbound_tx: &OutboundSender,
) {
    match classify(&envelope) {
        EnvelopeKind::System => handle_system(state, session_id, envelope, outbound_tx).await,
        EnvelopeKind::Gateway => handle_gateway(state, envelope, outbound_tx).await,
        EnvelopeKind::Business => handle_business(state, session_id, envelope, outbound_tx).await,
        EnvelopeKind::Unknown => {
            reply_error(outbound_tx, error_codes::UNKNOWN_MESSAGE_ID, "unrecognized message");
        },
    }
}

async fn handle_system(
    state: &Arc<GatewayState>,
    session_id: u64,
    envelope: ClientEnvelope,
    outbound_tx: &OutboundSender,
) {
    match envelope.r#type.as_str() {
        "ping" => reply(outbound_tx, "pong", serde_json::json!({})),
        "heartbeat" => {
            if let Ok(Some(mut session)) = state.sessions.get(session_id).await {
                session.update_ping();
                let _ = state.sessions.save(&session).await;
            }
            reply(outbound_tx, "heartbeat_ack", serde_json::json!({}));
        },
        "auth" | "login" => handle_auth(state, session_id, &envelope, outbound_tx).await,
        "logout" => {
            if let Ok(Some(mut session)) = state.sessions.get(session_id).await {
                let user_id = session.attributes.user_id.clone();
                session.logout();
                let _ = state.sessions.save(&session).await;
                if let Some(user_id) = user_id {
                    let _ = state.sessions.logout_user(&user_id).await;
                }
            }
            reply(outbound_tx, "logout_ack", serde_json::json!({}));
        },
        _ => reply_error(outbound_tx, error_codes::UNKNOWN_GATEWAY_MESSAGE, "unhandled system message"),
    }
}

async fn handle_auth(
    state: &Arc<GatewayState>,
    session_id: u64,
    envelope: &ClientEnvelope,
    outbound_tx: &OutboundSender,
) {
    let user_id = envelope.data.get("user_id").and_then(serde_json::Value::as_str).unwrap_or_default();
    let token = envelope.data.get("token").and_then(serde_json::Value::as_str).unwrap_or_default();

    let authenticated = match state.collaborators.auth.authenticate(user_id, token).await {
        Ok(ok) => ok,
        Err(err) => {
            reply_auth_failed(outbound_tx, error_codes::AUTH_FAILED, err.to_string());
            return;
        },
    };

    if !authenticated {
        reply_auth_failed(outbound_tx, error_codes::AUTH_FAILED, "invalid credentials");
        return;
    }

    let player_id = envelope.player_id();
    match state.sessions.authenticate(session_id, user_id, player_id).await {
        Ok(session) => {
            gg_metrics::counter!(gg_metrics::session::AUTHENTICATED_TOTAL).increment(1);
            reply(
                outbound_tx,
                "auth_response",
                serde_json::json!({ "success": true, "session_id": session.id, "user_id": user_id }),
            );
        },
        Err(err) => reply_auth_failed(outbound_tx, error_codes::AUTH_FAILED, err.to_string()),
    }
}

async fn handle_gateway(state: &Arc<GatewayState>, envelope: ClientEnvelope, outbound_tx: &OutboundSender) {
    match envelope.r#type.as_str() {
        "stats" => {
            let pool = state.pool.stats();
            let queue_size = state.queue.size();
            reply(
                outbound_tx,
                "stats_response",
                serde_json::json!({
                    "connections_active": pool.active,
                    "queue_size": queue_size,
                    "is_throttling": state.queue.is_throttling(),
                }),
            );
        },
        "info" => reply(outbound_tx, "info_response", serde_json::json!({ "service": "gg-gateway" })),
        _ => reply_error(outbound_tx, error_codes::UNKNOWN_GATEWAY_MESSAGE, "unhandled gateway message"),
    }
}

async fn handle_business(
    state: &Arc<GatewayState>,
    session_id: u64,
    mut envelope: ClientEnvelope,
    outbound_tx: &OutboundSender,
) {
    let Some(session) = state.sessions.get_local(session_id) else {
        reply_error(outbound_tx, error_codes::NOT_AUTHENTICATED, "session not found");
        return;
    };
    if !session.is_authenticated() {
        reply_error(outbound_tx, error_codes::NOT_AUTHENTICATED, "authenticate before sending business messages");
        return;
    }

    let Some(msg_id) = envelope.msg_id() else {
        reply_error(outbound_tx, error_codes::UNKNOWN_MESSAGE_ID, "missing msg_id");
        return;
    };

    if envelope.player_id().is_none() {
        if let (Some(obj), Some(player_id)) = (envelope.data.as_object_mut(), session.attributes.player_id.clone()) {
            obj.insert("player_id".to_string(), serde_json::Value::String(player_id));
        }
    }

    let priority = Priority::for_business_msg_id(msg_id);
    let sequence = envelope.sequence();
    match state.queue.enqueue(envelope, priority) {
        Ok(()) => forward_ack(outbound_tx, msg_id, sequence),
        Err(gg_queue::Error::QueueFull) => {
            reply_error(outbound_tx, error_codes::QUEUE_FULL, "queue is full, try again later");
        },
        Err(gg_queue::Error::Duplicate) => {
            // The client already has a response in flight for this
            // (msg_id, sequence, player_id) fingerprint; ack as if accepted.
            forward_ack(outbound_tx, msg_id, sequence);
        },
        Err(err) => reply_error(outbound_tx, error_codes::MESSAGE_PROCESSING_ERROR, err.to_string()),
    }
}

fn forward_ack(outbound_tx: &OutboundSender, original_msg_id: i64, sequence: Option<String>) {
    reply(
        outbound_tx,
        "forward_ack",
        serde_json::json!({ "original_msg_id": original_msg_id, "sequence": sequence }),
    );
}
