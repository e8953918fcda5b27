//! The connection object: the read/write/heartbeat triple running for one
//! accepted WebSocket, from handshake through to cleanup.
//!
//! Grounded on the split-socket + mpsc write task shape used by every
//! long-lived WebSocket handler in this codebase: the socket is split once,
//! the write half is driven by a task that only ever sees serialized
//! frames, and the read half drives a loop that classifies and dispatches
//! each inbound frame.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::extract::ws::{Message, WebSocket};
use futures::{stream::StreamExt, SinkExt};
use gg_protocol::{ClientEnvelope, CloseCode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{handlers, state::GatewayState};

const WRITE_BATCH_SIZE: usize = 100;
const WRITE_BATCH_TIMEOUT: Duration = Duration::from_millis(10);
/// Inbound frames queue while a slow client's handler backlog builds up;
/// beyond this the oldest buffered frame is dropped rather than the socket.
const READ_QUEUE_CAPACITY: usize = 256;

/// What the write loop can be asked to send: a serialized application frame,
/// or a real WebSocket close handshake with a specific code.
pub(crate) enum OutboundFrame {
    Text(String),
    Close(CloseCode),
}

pub(crate) type OutboundSender = mpsc::Sender<OutboundFrame>;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Drive one WebSocket connection through accept, message loop, and
/// cleanup. Never panics on a single bad frame — classification and
/// handler failures are converted into an `error` frame and the loop
/// continues.
pub async fn run(socket: WebSocket, state: Arc<GatewayState>, remote_addr: SocketAddr) {
    let session = match state.sessions.create().await {
        Ok(session) => session,
        Err(err) => {
            warn!(%err, %remote_addr, "failed to create session, closing connection");
            return;
        },
    };
    let session_id = session.id;

    let cancel = match state.pool.create_connection(session_id) {
        Ok(cancel) => cancel,
        Err(err) => {
            warn!(%err, session_id, "connection pool exhausted, rejecting connection");
            let _ = state.sessions.remove(session_id).await;
            let (mut ws_tx, _) = socket.split();
            let _ = ws_tx
                .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: CloseCode::ServiceUnavailable.code(),
                    reason: CloseCode::ServiceUnavailable.reason().into(),
                })))
                .await;
            return;
        },
    };

    info!(session_id, %remote_addr, "connection accepted");
    metrics_connected();

    let (ws_tx, ws_rx) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>(READ_QUEUE_CAPACITY);

    let write_handle = tokio::spawn(write_loop(ws_tx, outbound_rx, cancel.clone()));
    let heartbeat_handle = tokio::spawn(heartbeat_loop(
        Arc::clone(&state),
        session_id,
        outbound_tx.clone(),
        cancel.clone(),
    ));

    read_loop(ws_rx, Arc::clone(&state), session_id, outbound_tx.clone(), cancel.clone()).await;

    cancel.cancel();
    heartbeat_handle.abort();
    drop(outbound_tx);
    let _ = write_handle.await;

    state.pool.release_connection(session_id);
    if let Ok(Some(mut session)) = state.sessions.get(session_id).await {
        session.disconnect();
        let _ = state.sessions.save(&session).await;
    }
    let _ = state.sessions.remove(session_id).await;
    metrics_disconnected();

    info!(session_id, "connection closed");
}

async fn read_loop(
    mut ws_rx: futures::stream::SplitStream<WebSocket>,
    state: Arc<GatewayState>,
    session_id: u64,
    outbound_tx: OutboundSender,
    cancel: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => break,
            msg = ws_rx.next() => msg,
        };

        let Some(msg) = msg else { break };
        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Pong(_)) => {
                touch_pong(&state, session_id).await;
                continue;
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                debug!(session_id, %err, "read error, closing connection");
                break;
            },
        };

        state.pool.touch(session_id);

        let envelope: ClientEnvelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(session_id, %err, "failed to decode frame");
                send_error(&outbound_tx, gg_protocol::error_codes::MESSAGE_PROCESSING_ERROR, "invalid frame");
                continue;
            },
        };

        handlers::handle_envelope(&state, session_id, envelope, &outbound_tx).await;
    }
}

async fn write_loop(
    mut ws_tx: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
    cancel: CancellationToken,
) {
    loop {
        let Some(first) = (tokio::select! {
            () = cancel.cancelled() => None,
            msg = outbound_rx.recv() => msg,
        }) else {
            break;
        };

        // A close handshake ends the batch immediately: nothing queued after
        // it would reach the client anyway.
        let OutboundFrame::Text(first) = first else {
            let OutboundFrame::Close(code) = first else { unreachable!() };
            let _ = ws_tx
                .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: code.code(),
                    reason: code.reason().into(),
                })))
                .await;
            return;
        };

        let mut batch = vec![first];
        let deadline = tokio::time::Instant::now() + WRITE_BATCH_TIMEOUT;
        let mut closing = None;
        while batch.len() < WRITE_BATCH_SIZE {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, outbound_rx.recv()).await {
                Ok(Some(OutboundFrame::Text(frame))) => batch.push(frame),
                Ok(Some(OutboundFrame::Close(code))) => {
                    closing = Some(code);
                    break;
                },
                _ => break,
            }
        }

        for frame in batch {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }

        if let Some(code) = closing {
            let _ = ws_tx
                .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                    code: code.code(),
                    reason: code.reason().into(),
                })))
                .await;
            return;
        }
    }
    let _ = ws_tx.close().await;
}

async fn heartbeat_loop(
    state: Arc<GatewayState>,
    session_id: u64,
    outbound_tx: OutboundSender,
    cancel: CancellationToken,
) {
    let interval = Duration::from_secs(state.config.heartbeat.interval_secs);
    let timeout = Duration::from_secs(state.config.heartbeat.timeout_secs);
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = ticker.tick() => {},
        }

        let Ok(Some(mut session)) = state.sessions.get(session_id).await else {
            return;
        };

        if let Some(last_pong) = session.last_pong_ms {
            let idle_ms = now_ms().saturating_sub(last_pong);
            if idle_ms as u128 > timeout.as_millis() && session.last_ping_ms.is_some() {
                warn!(session_id, idle_ms, "heartbeat timeout, closing connection");
                send_close(&outbound_tx, CloseCode::HeartbeatTimeout);
                cancel.cancel();
                return;
            }
        }

        session.update_ping();
        let _ = state.sessions.save(&session).await;

        let frame = ClientEnvelope::new("heartbeat", serde_json::json!({}), now_ms());
        if let Ok(text) = serde_json::to_string(&frame) {
            if outbound_tx.send(OutboundFrame::Text(text)).await.is_err() {
                return;
            }
            gg_metrics::counter!(gg_metrics::heartbeat::SENT_TOTAL).increment(1);
        }
    }
}

async fn touch_pong(state: &Arc<GatewayState>, session_id: u64) {
    if let Ok(Some(mut session)) = state.sessions.get(session_id).await {
        session.update_pong();
        let _ = state.sessions.save(&session).await;
    }
}

fn send_error(outbound_tx: &OutboundSender, error_code: &str, message: &str) {
    let frame = ClientEnvelope::new(
        "error",
        serde_json::json!({ "error_code": error_code, "message": message }),
        now_ms(),
    );
    if let Ok(text) = serde_json::to_string(&frame) {
        let _ = outbound_tx.try_send(OutboundFrame::Text(text));
    }
}

fn send_close(outbound_tx: &OutboundSender, code: CloseCode) {
    let _ = outbound_tx.try_send(OutboundFrame::Close(code));
}

fn metrics_connected() {
    gg_metrics::counter!(gg_metrics::websocket::CONNECTIONS_TOTAL).increment(1);
    gg_metrics::gauge!(gg_metrics::websocket::CONNECTIONS_ACTIVE).increment(1.0);
}

fn metrics_disconnected() {
    gg_metrics::gauge!(gg_metrics::websocket::CONNECTIONS_ACTIVE).decrement(1.0);
    gg_metrics::counter!(gg_metrics::websocket::CLOSE_TOTAL).increment(1);
}
