//! Static msg_id → service-type routing table.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Logic,
    Chat,
    Fight,
    Gateway,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logic => "logic",
            Self::Chat => "chat",
            Self::Fight => "fight",
            Self::Gateway => "gateway",
        }
    }
}

#[derive(Debug, Error)]
pub enum MsgIdError {
    #[error("unknown msg_id {0}")]
    UnknownMessageId(i64),
}

/// Map a business `msg_id` to the service that owns it.
///
/// Ranges: 1-999 system (not routed here), 1000-1999 logic, 2000-2999
/// chat, 3000-3999 fight, 9000-9999 gateway-local.
pub fn service_for_msg_id(msg_id: i64) -> Result<ServiceKind, MsgIdError> {
    let magnitude = msg_id.unsigned_abs();
    match magnitude {
        1000..=1999 => Ok(ServiceKind::Logic),
        2000..=2999 => Ok(ServiceKind::Chat),
        3000..=3999 => Ok(ServiceKind::Fight),
        9000..=9999 => Ok(ServiceKind::Gateway),
        _ => Err(MsgIdError::UnknownMessageId(msg_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_ranges() {
        assert_eq!(service_for_msg_id(1001).unwrap(), ServiceKind::Logic);
        assert_eq!(service_for_msg_id(2001).unwrap(), ServiceKind::Chat);
        assert_eq!(service_for_msg_id(3001).unwrap(), ServiceKind::Fight);
        assert_eq!(service_for_msg_id(9001).unwrap(), ServiceKind::Gateway);
    }

    #[test]
    fn negative_ids_route_by_magnitude() {
        assert_eq!(service_for_msg_id(-1001).unwrap(), ServiceKind::Logic);
    }

    #[test]
    fn unknown_id_errors() {
        assert!(matches!(
            service_for_msg_id(500),
            Err(MsgIdError::UnknownMessageId(500))
        ));
    }
}
