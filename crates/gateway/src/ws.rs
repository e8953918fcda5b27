//! WebSocket upgrade endpoint: accepts the HTTP upgrade and hands the
//! socket off to the connection driver.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::WebSocketUpgrade,
        ConnectInfo, State,
    },
    response::IntoResponse,
};

use crate::{connection, state::GatewayState};

pub async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::run(socket, state, remote_addr))
}
