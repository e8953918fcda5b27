//! RPC client: retrying, circuit-breaker-gated gRPC calls against a single
//! backend target.

use std::{sync::Arc, time::Duration};

use gg_protocol::{RpcRequest, RpcResponse};
use tokio_stream::StreamExt;
use tracing::warn;

use crate::{
    circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats},
    error::{Error, Result},
    pool::ChannelPool,
    proto,
};

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(3),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// A client bound to one `host:port` backend target, sharing a channel pool
/// with any other clients that target the same service.
pub struct RpcClient {
    target: String,
    pool: Arc<ChannelPool>,
    circuit: CircuitBreaker,
    config: RpcClientConfig,
}

impl RpcClient {
    #[must_use]
    pub fn new(target: impl Into<String>, pool: Arc<ChannelPool>, config: RpcClientConfig) -> Self {
        Self { target: target.into(), circuit: CircuitBreaker::new(config.circuit_breaker.clone()), pool, config }
    }

    /// Executes one RPC, retrying transient failures with linear backoff.
    /// The circuit breaker is consulted once up front and updated once at
    /// the end, on the outcome of the whole attempt sequence.
    pub async fn call(&self, request: RpcRequest, timeout: Option<Duration>) -> Result<RpcResponse> {
        if !self.circuit.allow_request() {
            return Err(Error::CircuitOpen(self.target.clone()));
        }

        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let mut last_err = Error::ConnectionUnavailable(self.target.clone());

        for attempt in 0..=self.config.max_retries {
            match self.execute_once(&request, timeout).await {
                Ok(response) => {
                    self.circuit.record_success();
                    return Ok(response);
                },
                Err(err) => {
                    if attempt == self.config.max_retries {
                        last_err = err;
                        break;
                    }
                    warn!(target = %self.target, %attempt, error = %err, "rpc call failed, retrying");
                    last_err = err;
                    tokio::time::sleep(self.config.retry_delay * (attempt + 1)).await;
                },
            }
        }

        self.circuit.record_failure();
        Err(last_err)
    }

    async fn execute_once(&self, request: &RpcRequest, timeout: Duration) -> Result<RpcResponse> {
        let (channel, idx) = self.pool.acquire(&self.target).await?;
        let mut client = proto::rpc_transport_client::RpcTransportClient::new(channel);

        let wire_request = proto::RpcRequest {
            service_name: request.service_name.clone(),
            method_name: request.method_name.clone(),
            payload: request.payload.clone(),
            metadata: request.metadata.clone(),
        };

        let outcome = tokio::time::timeout(timeout, client.call(wire_request)).await;
        match outcome {
            Err(_) => {
                self.pool.report_result(&self.target, idx, false);
                Err(Error::Timeout(timeout))
            },
            Ok(Err(status)) => {
                self.pool.report_result(&self.target, idx, false);
                Err(Error::Status(status))
            },
            Ok(Ok(response)) => {
                self.pool.report_result(&self.target, idx, true);
                let body = response.into_inner();
                Ok(RpcResponse { code: body.code, message: body.message, payload: body.payload })
            },
        }
    }

    /// Bidirectional streaming call, used by handlers that need to push a
    /// batch of requests and consume responses as they arrive rather than
    /// waiting for one round trip per message.
    pub async fn stream_call(&self, requests: Vec<RpcRequest>, timeout: Duration) -> Result<Vec<RpcResponse>> {
        if !self.circuit.allow_request() {
            return Err(Error::CircuitOpen(self.target.clone()));
        }

        let (channel, idx) = self.pool.acquire(&self.target).await?;
        let mut client = proto::rpc_transport_client::RpcTransportClient::new(channel);

        let wire_requests: Vec<proto::RpcRequest> = requests
            .into_iter()
            .map(|request| proto::RpcRequest {
                service_name: request.service_name,
                method_name: request.method_name,
                payload: request.payload,
                metadata: request.metadata,
            })
            .collect();

        let call = client.stream_call(tokio_stream::iter(wire_requests));
        let outcome = tokio::time::timeout(timeout, call).await;

        let responses = match outcome {
            Err(_) => {
                self.pool.report_result(&self.target, idx, false);
                self.circuit.record_failure();
                return Err(Error::Timeout(timeout));
            },
            Ok(Err(status)) => {
                self.pool.report_result(&self.target, idx, false);
                self.circuit.record_failure();
                return Err(Error::Status(status));
            },
            Ok(Ok(stream)) => stream.into_inner(),
        };

        let mut results = Vec::new();
        let mut stream = responses;
        while let Some(item) = stream.next().await {
            match item {
                Ok(body) => results.push(RpcResponse { code: body.code, message: body.message, payload: body.payload }),
                Err(status) => {
                    self.pool.report_result(&self.target, idx, false);
                    self.circuit.record_failure();
                    return Err(Error::Status(status));
                },
            }
        }

        self.pool.report_result(&self.target, idx, true);
        self.circuit.record_success();
        Ok(results)
    }

    pub fn circuit_stats(&self) -> CircuitBreakerStats {
        self.circuit.stats()
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}
