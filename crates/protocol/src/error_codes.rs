//! Error codes surfaced to clients in `{"type": "error", "error_code": ...}` frames.

pub const AUTH_FAILED: &str = "AUTH_FAILED";
pub const NOT_AUTHENTICATED: &str = "NOT_AUTHENTICATED";
pub const QUEUE_FULL: &str = "QUEUE_FULL";
pub const UNKNOWN_GATEWAY_MESSAGE: &str = "UNKNOWN_GATEWAY_MESSAGE";
pub const MESSAGE_PROCESSING_ERROR: &str = "MESSAGE_PROCESSING_ERROR";
pub const UNKNOWN_MESSAGE_ID: &str = "UNKNOWN_MESSAGE_ID";
pub const NO_HEALTHY_INSTANCE: &str = "NO_HEALTHY_INSTANCE";
