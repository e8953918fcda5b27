//! The `Session` object itself: connection/auth lifecycle state plus the
//! attributes collected during the handshake.
//!
//! Timestamps are stored as milliseconds since the Unix epoch rather than
//! `Instant`, so a session round-trips through the shared KV mirror without
//! losing meaning across process boundaries.

use std::{
    collections::{HashMap, HashSet},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Connecting,
    Connected,
    Authenticated,
    Disconnected,
    Expired,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAttributes {
    pub user_id: Option<String>,
    pub player_id: Option<String>,
    pub device_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub metadata: HashMap<String, String>,
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// One connected client's lifecycle state.
///
/// `id` comes from [`gg_common::IdGenerator`]; everything else tracks
/// connection/auth state the way the gateway's handlers and pool need it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: u64,
    pub state: SessionState,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
    pub authenticated_at_ms: Option<u64>,
    pub expires_at_ms: Option<u64>,
    pub attributes: SessionAttributes,
    pub permissions: HashSet<String>,
    pub roles: HashSet<String>,
    pub message_count: u64,
    pub last_ping_ms: Option<u64>,
    pub last_pong_ms: Option<u64>,
}

impl Session {
    #[must_use]
    pub fn new(id: u64) -> Self {
        let now = now_ms();
        Self {
            id,
            state: SessionState::Connecting,
            created_at_ms: now,
            last_activity_ms: now,
            authenticated_at_ms: None,
            expires_at_ms: None,
            attributes: SessionAttributes::default(),
            permissions: HashSet::new(),
            roles: HashSet::new(),
            message_count: 0,
            last_ping_ms: None,
            last_pong_ms: None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Connected | SessionState::Authenticated)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms() >= at)
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(now_ms().saturating_sub(self.created_at_ms))
    }

    #[must_use]
    pub fn idle_time(&self) -> Duration {
        Duration::from_millis(now_ms().saturating_sub(self.last_activity_ms))
    }

    pub fn mark_connected(&mut self) {
        self.state = SessionState::Connected;
        self.update_activity();
    }

    /// Promotes the session to `Authenticated`, records the owning user, and
    /// arms the expiry clock for `ttl` from now.
    pub fn authenticate(&mut self, user_id: impl Into<String>, player_id: Option<String>, ttl: Duration) {
        let now = now_ms();
        self.attributes.user_id = Some(user_id.into());
        self.attributes.player_id = player_id;
        self.authenticated_at_ms = Some(now);
        self.expires_at_ms = Some(now + ttl.as_millis() as u64);
        self.state = SessionState::Authenticated;
    }

    /// Drops back to `Connected`, clearing auth state but keeping the
    /// connection itself alive.
    pub fn logout(&mut self) {
        self.authenticated_at_ms = None;
        self.expires_at_ms = None;
        self.permissions.clear();
        self.roles.clear();
        if self.state == SessionState::Authenticated {
            self.state = SessionState::Connected;
        }
    }

    pub fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// Pushes the expiry clock `ttl` out from now. No-op if the session was
    /// never authenticated (no expiry clock to extend).
    pub fn renew(&mut self, ttl: Duration) -> bool {
        if self.expires_at_ms.is_none() {
            return false;
        }
        self.expires_at_ms = Some(now_ms() + ttl.as_millis() as u64);
        true
    }

    pub fn update_activity(&mut self) {
        self.last_activity_ms = now_ms();
        self.message_count += 1;
    }

    pub fn update_ping(&mut self) {
        self.last_ping_ms = Some(now_ms());
    }

    pub fn update_pong(&mut self) {
        self.last_pong_ms = Some(now_ms());
    }

    pub fn add_permission(&mut self, permission: impl Into<String>) {
        self.permissions.insert(permission.into());
    }

    pub fn remove_permission(&mut self, permission: &str) {
        self.permissions.remove(permission);
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.roles.insert(role.into());
    }

    pub fn remove_role(&mut self, role: &str) {
        self.roles.remove(role);
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_connecting_and_unauthenticated() {
        let session = Session::new(1);
        assert_eq!(session.state, SessionState::Connecting);
        assert!(!session.is_authenticated());
        assert!(!session.is_connected());
    }

    #[test]
    fn authenticate_sets_expiry_and_state() {
        let mut session = Session::new(1);
        session.mark_connected();
        session.authenticate("user-1", Some("player-1".to_string()), Duration::from_secs(1800));

        assert!(session.is_authenticated());
        assert_eq!(session.attributes.user_id.as_deref(), Some("user-1"));
        assert!(session.expires_at_ms.is_some());
        assert!(!session.is_expired());
    }

    #[test]
    fn logout_clears_auth_but_keeps_connection() {
        let mut session = Session::new(1);
        session.mark_connected();
        session.authenticate("user-1", None, Duration::from_secs(1800));
        session.logout();

        assert!(!session.is_authenticated());
        assert!(session.is_connected());
        assert!(session.expires_at_ms.is_none());
    }

    #[test]
    fn renew_requires_prior_authentication() {
        let mut session = Session::new(1);
        assert!(!session.renew(Duration::from_secs(60)));

        session.authenticate("user-1", None, Duration::from_millis(1));
        assert!(session.renew(Duration::from_secs(60)));
        assert!(!session.is_expired());
    }

    #[test]
    fn expired_once_ttl_elapses() {
        let mut session = Session::new(1);
        session.authenticate("user-1", None, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(session.is_expired());
    }

    #[test]
    fn permissions_and_roles_roundtrip() {
        let mut session = Session::new(1);
        session.add_permission("chat.send");
        session.add_role("moderator");
        assert!(session.has_permission("chat.send"));
        assert!(session.has_role("moderator"));

        session.remove_permission("chat.send");
        assert!(!session.has_permission("chat.send"));
    }
}
