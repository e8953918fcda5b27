//! Client wire protocol, RPC transport envelopes, and msg_id routing table.
//!
//! The client-facing wire format is JSON over WebSocket; the backend RPC
//! transport uses a separate, framing-agnostic request/response envelope
//! that `gg-rpc` serializes over gRPC.

pub mod close;
pub mod envelope;
pub mod error_codes;
pub mod msg_id;
pub mod rpc;

pub use {
    close::CloseCode,
    envelope::{ClientEnvelope, EnvelopeKind},
    msg_id::{MsgIdError, ServiceKind, service_for_msg_id},
    rpc::{RpcRequest, RpcResponse},
};
