//! Trait interfaces for the collaborators the gateway depends on but does
//! not own: service discovery, the shared key-value mirror, and credential
//! validation.
//!
//! Each trait ships a default implementation so the gateway can run
//! standalone (single node, no external KV store, env-var discovery) before
//! a deployment wires in the real backends.

use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

/// Error type returned by collaborator trait methods.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{message}")]
    Message { message: String },
    #[error("{0}")]
    Serde(#[from] serde_json::Error),
}

impl ServiceError {
    #[must_use]
    pub fn message(message: impl std::fmt::Display) -> Self {
        Self::Message { message: message.to_string() }
    }
}

impl From<String> for ServiceError {
    fn from(value: String) -> Self {
        Self::message(value)
    }
}

impl From<&str> for ServiceError {
    fn from(value: &str) -> Self {
        Self::message(value)
    }
}

pub type ServiceResult<T = Value> = Result<T, ServiceError>;

// ── Discovery ────────────────────────────────────────────────────────────────

/// One resolved backend instance for a named service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub healthy: bool,
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self { id: id.into(), host: host.into(), port, healthy: true, metadata: HashMap::new() }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Membership change pushed by a discovery backend that supports watching.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    Added(ServiceInstance),
    Removed(String),
}

/// Source of truth for "which instances back this service right now".
///
/// Implementations are free to poll, subscribe to a registry, or read a
/// static list. `watch` is optional; backends that can't push updates leave
/// the caller to re-poll `list_instances` on its own interval.
#[async_trait]
pub trait DiscoveryBackend: Send + Sync {
    async fn list_instances(&self, service_name: &str) -> ServiceResult<Vec<ServiceInstance>>;

    async fn watch(&self, _service_name: &str) -> Option<tokio::sync::mpsc::Receiver<DiscoveryEvent>> {
        None
    }
}

/// Static, environment-variable-driven discovery: `<SERVICE>_SERVICES=host:port,host:port`.
///
/// This is the default collaborator wired in when no service registry is
/// configured; it never returns unhealthy instances because it has no way
/// to probe them.
pub struct EnvDiscoveryBackend;

impl EnvDiscoveryBackend {
    fn parse_instances(service_name: &str, raw: &str) -> ServiceResult<Vec<ServiceInstance>> {
        let env_key = format!("{}_SERVICES", service_name.to_uppercase());
        let mut instances = Vec::new();
        for (idx, entry) in raw.split(',').map(str::trim).filter(|s| !s.is_empty()).enumerate() {
            let (host, port) = entry.split_once(':').ok_or_else(|| {
                ServiceError::message(format!("invalid {env_key} entry {entry:?}, expected host:port"))
            })?;
            let port: u16 = port
                .parse()
                .map_err(|_| ServiceError::message(format!("invalid port in {env_key} entry {entry:?}")))?;
            instances.push(ServiceInstance::new(format!("{service_name}-{idx}"), host, port));
        }
        Ok(instances)
    }
}

#[async_trait]
impl DiscoveryBackend for EnvDiscoveryBackend {
    async fn list_instances(&self, service_name: &str) -> ServiceResult<Vec<ServiceInstance>> {
        let env_key = format!("{}_SERVICES", service_name.to_uppercase());
        let raw = match std::env::var(&env_key) {
            Ok(raw) => raw,
            Err(_) => return Ok(Vec::new()),
        };
        Self::parse_instances(service_name, &raw)
    }
}

// ── KvStore ──────────────────────────────────────────────────────────────────

/// The shared key-value mirror sessions and presence data are written
/// through, so any node in the deployment can reconstruct them.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> ServiceResult<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> ServiceResult<()>;
    async fn delete(&self, key: &str) -> ServiceResult<()>;
    async fn sadd(&self, key: &str, member: &str) -> ServiceResult<()>;
    async fn smembers(&self, key: &str) -> ServiceResult<Vec<String>>;
    async fn expire(&self, key: &str, ttl: Duration) -> ServiceResult<()>;
}

struct Entry {
    value: String,
    expires_at: Option<std::time::Instant>,
}

struct SetEntry {
    members: std::collections::HashSet<String>,
    expires_at: Option<std::time::Instant>,
}

/// In-process `KvStore` backed by `dashmap`, used when the gateway runs as
/// a single node with no shared cache deployed.
///
/// Presence data written here does not survive a restart and is invisible
/// to other nodes; cross-node session reconstruction requires a real
/// `KvStore` implementation (Redis, etc.) wired in at the deployment layer.
#[derive(Default)]
pub struct InMemoryKvStore {
    strings: dashmap::DashMap<String, Entry>,
    sets: dashmap::DashMap<String, SetEntry>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn expired(expires_at: Option<std::time::Instant>) -> bool {
        expires_at.is_some_and(|at| std::time::Instant::now() >= at)
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> ServiceResult<Option<String>> {
        match self.strings.get(key) {
            Some(entry) if Self::expired(entry.expires_at) => {
                drop(entry);
                self.strings.remove(key);
                Ok(None)
            },
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> ServiceResult<()> {
        let expires_at = ttl.map(|ttl| std::time::Instant::now() + ttl);
        self.strings.insert(key.to_string(), Entry { value: value.to_string(), expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> ServiceResult<()> {
        self.strings.remove(key);
        self.sets.remove(key);
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> ServiceResult<()> {
        self.sets
            .entry(key.to_string())
            .or_insert_with(|| SetEntry { members: Default::default(), expires_at: None })
            .members
            .insert(member.to_string());
        Ok(())
    }

    async fn smembers(&self, key: &str) -> ServiceResult<Vec<String>> {
        match self.sets.get(key) {
            Some(entry) if Self::expired(entry.expires_at) => {
                drop(entry);
                self.sets.remove(key);
                Ok(Vec::new())
            },
            Some(entry) => Ok(entry.members.iter().cloned().collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> ServiceResult<()> {
        let expires_at = Some(std::time::Instant::now() + ttl);
        if let Some(mut entry) = self.strings.get_mut(key) {
            entry.expires_at = expires_at;
        }
        if let Some(mut entry) = self.sets.get_mut(key) {
            entry.expires_at = expires_at;
        }
        Ok(())
    }
}

// ── Auth ─────────────────────────────────────────────────────────────────────

/// Validates client-supplied credentials during the connection handshake.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn authenticate(&self, user_id: &str, token: &str) -> ServiceResult<bool>;
}

/// Placeholder credential check: non-empty `user_id`, `token` at least 8
/// bytes. Real deployments wire in an `AuthBackend` that calls out to the
/// account service; this exists so the handshake has something to call
/// when none is configured.
pub struct PlaceholderAuthBackend;

#[async_trait]
impl AuthBackend for PlaceholderAuthBackend {
    async fn authenticate(&self, user_id: &str, token: &str) -> ServiceResult<bool> {
        Ok(!user_id.is_empty() && token.len() >= 8)
    }
}

// ── Collaborators bundle ─────────────────────────────────────────────────────

/// Bundle of the external collaborators the gateway is wired against.
///
/// Built once at startup and shared by reference through the composition
/// root; swapping any one of these for a real backend requires no changes
/// elsewhere in the gateway.
pub struct Collaborators {
    pub discovery: Arc<dyn DiscoveryBackend>,
    pub kv_store: Arc<dyn KvStore>,
    pub auth: Arc<dyn AuthBackend>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            discovery: Arc::new(EnvDiscoveryBackend),
            kv_store: Arc::new(InMemoryKvStore::new()),
            auth: Arc::new(PlaceholderAuthBackend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_discovery_parses_host_port_list() {
        let instances = EnvDiscoveryBackend::parse_instances("widget", "10.0.0.1:9001, 10.0.0.2:9001").unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].address(), "10.0.0.1:9001");
    }

    #[test]
    fn env_discovery_rejects_malformed_entry() {
        assert!(EnvDiscoveryBackend::parse_instances("widget", "not-a-host-port").is_err());
    }

    #[tokio::test]
    async fn env_discovery_returns_empty_when_unset() {
        let backend = EnvDiscoveryBackend;
        let instances = backend.list_instances("nonexistent-service-xyz").await.unwrap();
        assert!(instances.is_empty());
    }

    #[tokio::test]
    async fn in_memory_kv_store_roundtrips() {
        let store = InMemoryKvStore::new();
        store.set("session:1", "payload", None).await.unwrap();
        assert_eq!(store.get("session:1").await.unwrap(), Some("payload".to_string()));
        store.delete("session:1").await.unwrap();
        assert_eq!(store.get("session:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_kv_store_expires_ttl_entries() {
        let store = InMemoryKvStore::new();
        store.set("k", "v", Some(Duration::from_millis(10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn in_memory_kv_store_set_membership() {
        let store = InMemoryKvStore::new();
        store.sadd("user_sessions:42", "sess-a").await.unwrap();
        store.sadd("user_sessions:42", "sess-b").await.unwrap();
        let mut members = store.smembers("user_sessions:42").await.unwrap();
        members.sort();
        assert_eq!(members, vec!["sess-a".to_string(), "sess-b".to_string()]);
    }

    #[tokio::test]
    async fn placeholder_auth_backend_rejects_short_token() {
        let auth = PlaceholderAuthBackend;
        assert!(!auth.authenticate("user-1", "short").await.unwrap());
        assert!(auth.authenticate("user-1", "longenoughtoken").await.unwrap());
    }
}
