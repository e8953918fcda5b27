//! Request/response envelope used between the gateway and backend services.
//!
//! This is transport-agnostic; `gg-rpc` is responsible for putting it on the
//! wire (gRPC today). Keeping it here lets `gg-queue` and `gg-dispatcher`
//! depend on the shape without depending on the transport.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub service_name: String,
    pub method_name: String,
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl RpcRequest {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            payload,
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub code: i32,
    pub message: String,
    pub payload: Vec<u8>,
}

impl RpcResponse {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self { code: 0, message: String::new(), payload }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), payload: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_response_has_zero_code() {
        let resp = RpcResponse::ok(vec![1, 2, 3]);
        assert!(resp.is_ok());
        assert_eq!(resp.payload, vec![1, 2, 3]);
    }

    #[test]
    fn error_response_carries_message() {
        let resp = RpcResponse::error(13, "internal error");
        assert!(!resp.is_ok());
        assert_eq!(resp.message, "internal error");
    }
}
