//! The client wire envelope.
//!
//! `{"type": <string>, "data": <object|string|bytes>, "timestamp": <number>,
//! "id"?: <string>, "reply_to"?: <string>}`.

use serde::{Deserialize, Serialize};

/// One JSON frame exchanged with a client over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub r#type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "reply_to", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl ClientEnvelope {
    pub fn new(r#type: impl Into<String>, data: serde_json::Value, timestamp: i64) -> Self {
        Self {
            r#type: r#type.into(),
            data,
            timestamp,
            id: None,
            reply_to: None,
        }
    }

    /// Best-effort extraction of the business `msg_id` carried in `data`.
    pub fn msg_id(&self) -> Option<i64> {
        self.data.get("msg_id").and_then(serde_json::Value::as_i64)
    }

    pub fn sequence(&self) -> Option<String> {
        self.data
            .get("sequence")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }

    pub fn player_id(&self) -> Option<String> {
        self.data
            .get("player_id")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }
}

/// Well-known `type` values recognized before falling back to msg_id ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeKind {
    System,
    Gateway,
    Business,
    Unknown,
}

/// Classify a frame by `type` (system well-knowns) or `data.msg_id` range.
pub fn classify(envelope: &ClientEnvelope) -> EnvelopeKind {
    match envelope.r#type.as_str() {
        "ping" | "pong" | "heartbeat" | "heartbeat_ack" | "auth" | "auth_response" | "login"
        | "logout" => return EnvelopeKind::System,
        _ => {},
    }

    match envelope.msg_id() {
        Some(id) if (1..=999).contains(&id) => EnvelopeKind::System,
        Some(id) if (9000..=9999).contains(&id) => EnvelopeKind::Gateway,
        Some(id) if (1000..=8999).contains(&id) => EnvelopeKind::Business,
        Some(_) => EnvelopeKind::Unknown,
        None => EnvelopeKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_well_known_system_types() {
        let env = ClientEnvelope::new("ping", serde_json::json!({}), 0);
        assert_eq!(classify(&env), EnvelopeKind::System);
    }

    #[test]
    fn classifies_business_by_msg_id_range() {
        let env = ClientEnvelope::new("frame", serde_json::json!({"msg_id": 1001}), 0);
        assert_eq!(classify(&env), EnvelopeKind::Business);
    }

    #[test]
    fn classifies_gateway_range() {
        let env = ClientEnvelope::new("frame", serde_json::json!({"msg_id": 9001}), 0);
        assert_eq!(classify(&env), EnvelopeKind::Gateway);
    }

    #[test]
    fn unknown_without_msg_id() {
        let env = ClientEnvelope::new("echo", serde_json::json!({}), 0);
        assert_eq!(classify(&env), EnvelopeKind::Unknown);
    }
}
