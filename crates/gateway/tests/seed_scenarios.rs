#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end seed scenarios: a real gateway app served over a loopback
//! socket, driven by a real WebSocket client, with the backend leg played
//! by a mock `RpcTransport` server.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use gg_gateway::{server::build_app, state::GatewayState};
use gg_rpc::proto::{
    rpc_transport_server::{RpcTransport, RpcTransportServer},
    RpcRequest as WireRpcRequest, RpcResponse as WireRpcResponse,
};
use gg_service_traits::{Collaborators, ServiceInstance};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

struct MockLogic {
    received: tokio::sync::mpsc::UnboundedSender<WireRpcRequest>,
}

#[tonic::async_trait]
impl RpcTransport for MockLogic {
    type StreamCallStream = std::pin::Pin<Box<dyn futures::Stream<Item = Result<WireRpcResponse, tonic::Status>> + Send>>;

    async fn call(
        &self,
        request: tonic::Request<WireRpcRequest>,
    ) -> Result<tonic::Response<WireRpcResponse>, tonic::Status> {
        let _ = self.received.send(request.into_inner());
        Ok(tonic::Response::new(WireRpcResponse { code: 0, message: String::new(), payload: Vec::new() }))
    }

    async fn stream_call(
        &self,
        request: tonic::Request<tonic::Streaming<WireRpcRequest>>,
    ) -> Result<tonic::Response<Self::StreamCallStream>, tonic::Status> {
        let mut inbound = request.into_inner();
        let mut responses = Vec::new();
        while let Some(req) = inbound.next().await {
            let req = req?;
            let _ = self.received.send(req);
            responses.push(Ok(WireRpcResponse { code: 0, message: String::new(), payload: Vec::new() }));
        }
        Ok(tonic::Response::new(Box::pin(futures::stream::iter(responses))))
    }
}

/// Starts a mock "logic" backend, returning its address and a channel that
/// yields every request it receives.
async fn start_mock_logic() -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<WireRpcRequest>) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind mock logic");
        listener.local_addr().expect("local_addr")
    };
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(RpcTransportServer::new(MockLogic { received: tx }))
            .serve(addr)
            .await
            .expect("mock logic server");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, rx)
}

async fn start_gateway() -> (SocketAddr, Arc<GatewayState>) {
    let config = gg_config::GatewayConfig::default();
    let metrics =
        gg_metrics::init_metrics(gg_metrics::MetricsRecorderConfig { enabled: false, ..Default::default() }).expect("metrics");
    let state = GatewayState::new(config, Arc::new(Collaborators::default()), metrics).expect("state");

    tokio::spawn(Arc::clone(&state.dispatcher).run());

    let app = build_app(Arc::clone(&state), false);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.expect("serve");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, state)
}

fn envelope(r#type: &str, data: Value) -> String {
    json!({ "type": r#type, "data": data, "timestamp": 0 }).to_string()
}

#[tokio::test]
async fn s1_happy_path_business_forward() {
    let (logic_addr, mut received) = start_mock_logic().await;
    let (addr, state) = start_gateway().await;
    state.router.register_instance(
        "logic",
        ServiceInstance::new("logic-1", logic_addr.ip().to_string(), logic_addr.port()),
    );

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect");

    ws.send(Message::Text(
        envelope("auth", json!({ "user_id": "u1", "token": "abcdefgh", "player_id": "p1" })).into(),
    ))
    .await
    .expect("send auth");

    let auth_response: Value = loop {
        let Some(Ok(Message::Text(text))) = ws.next().await else { panic!("no auth response") };
        let frame: Value = serde_json::from_str(&text).unwrap();
        if frame["type"] == "auth_response" {
            break frame;
        }
    };
    assert_eq!(auth_response["data"]["success"], json!(true));

    ws.send(Message::Text(
        envelope("frame", json!({ "msg_id": 1001, "sequence": "s1", "player_id": "p1", "body": {} })).into(),
    ))
    .await
    .expect("send business frame");

    let ack = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            let Some(Ok(Message::Text(text))) = ws.next().await else { panic!("no ack") };
            let frame: Value = serde_json::from_str(&text).unwrap();
            if frame["type"] == "forward_ack" {
                return frame;
            }
        }
    })
    .await
    .expect("forward_ack within deadline");

    assert_eq!(ack["data"]["original_msg_id"], json!(1001));
    assert_eq!(ack["data"]["sequence"], json!("s1"));

    let forwarded = tokio::time::timeout(Duration::from_secs(2), received.recv())
        .await
        .expect("mock logic received a call")
        .expect("channel open");
    assert_eq!(forwarded.service_name, "logic");
    assert_eq!(forwarded.method_name, "HandleMessage");
    let payload: Value = serde_json::from_slice(&forwarded.payload).unwrap();
    assert_eq!(payload["data"]["msg_id"], json!(1001));
    assert_eq!(payload["data"]["player_id"], json!("p1"));
}

#[tokio::test]
async fn s2_unauthenticated_business_rejected() {
    let (addr, state) = start_gateway().await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.expect("connect");

    ws.send(Message::Text(
        envelope("frame", json!({ "msg_id": 2001, "sequence": "s2", "body": {} })).into(),
    ))
    .await
    .expect("send business frame");

    let error = tokio::time::timeout(Duration::from_millis(500), async {
        loop {
            let Some(Ok(Message::Text(text))) = ws.next().await else { panic!("no error reply") };
            let frame: Value = serde_json::from_str(&text).unwrap();
            if frame["type"] == "error" {
                return frame;
            }
        }
    })
    .await
    .expect("error reply within deadline");

    assert_eq!(error["data"]["error_code"], json!("NOT_AUTHENTICATED"));
    assert_eq!(state.queue.size(), 0);
}
