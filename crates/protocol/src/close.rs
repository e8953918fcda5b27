//! WebSocket close codes used when the gateway tears down a connection.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    Normal = 1000,
    HeartbeatTimeout = 1001,
    SessionCreateFailure = 1011,
    ServiceUnavailable = 1013,
}

impl CloseCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::HeartbeatTimeout => "Heartbeat timeout",
            Self::SessionCreateFailure => "session create failure",
            Self::ServiceUnavailable => "service unavailable",
        }
    }
}
