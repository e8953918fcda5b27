//! Route cache: remembers the last service a `(msg_id, player_id)` pair
//! resolved to, so repeat traffic skips the hash-ring walk.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use dashmap::DashMap;

struct CacheEntry {
    service_name: String,
    inserted_at: Instant,
}

pub struct RouteCacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded, TTL'd cache from routing key to resolved service name.
///
/// Eviction is approximate LRU: `access_order` records touches in a
/// `VecDeque` rather than re-linking a proper intrusive list, which is
/// cheaper for the read-heavy workload this sees and only matters when the
/// cache is actually at capacity.
pub struct RouteCache {
    max_size: usize,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
    access_order: parking_lot::Mutex<VecDeque<String>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl RouteCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            max_size,
            ttl,
            entries: DashMap::new(),
            access_order: parking_lot::Mutex::new(VecDeque::new()),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let Some(entry) = self.entries.get(key) else {
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return None;
        };

        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            return None;
        }

        let service_name = entry.service_name.clone();
        drop(entry);
        self.touch(key);
        self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(service_name)
    }

    pub fn put(&self, key: &str, service_name: &str) {
        if self.entries.len() >= self.max_size && !self.entries.contains_key(key) {
            self.evict_lru();
        }
        self.entries
            .insert(key.to_string(), CacheEntry { service_name: service_name.to_string(), inserted_at: Instant::now() });
        self.touch(key);
    }

    fn touch(&self, key: &str) {
        let mut order = self.access_order.lock();
        order.retain(|k| k != key);
        order.push_back(key.to_string());
    }

    fn evict_lru(&self) {
        let lru_key = {
            let mut order = self.access_order.lock();
            order.pop_front()
        };
        if let Some(key) = lru_key {
            self.entries.remove(&key);
        }
    }

    /// Drop expired entries and return how many were removed.
    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<String> =
            self.entries.iter().filter(|e| now.duration_since(e.inserted_at) > self.ttl).map(|e| e.key().clone()).collect();
        let count = expired.len();
        for key in &expired {
            self.entries.remove(key);
        }
        let mut order = self.access_order.lock();
        order.retain(|k| !expired.contains(k));
        count
    }

    pub fn stats(&self) -> RouteCacheStats {
        let now = Instant::now();
        let active = self.entries.iter().filter(|e| now.duration_since(e.inserted_at) <= self.ttl).count();
        RouteCacheStats {
            total_entries: self.entries.len(),
            active_entries: active,
            max_size: self.max_size,
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_roundtrips() {
        let cache = RouteCache::new(10, Duration::from_secs(60));
        cache.put("1001:player-1", "logic");
        assert_eq!(cache.get("1001:player-1"), Some("logic".to_string()));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = RouteCache::new(10, Duration::from_millis(10));
        cache.put("key", "logic");
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("key"), None);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let cache = RouteCache::new(2, Duration::from_secs(60));
        cache.put("a", "logic");
        cache.put("b", "chat");
        cache.get("a");
        cache.put("c", "fight");

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some("logic".to_string()));
        assert_eq!(cache.get("c"), Some("fight".to_string()));
    }

    #[test]
    fn stats_report_hits_and_misses() {
        let cache = RouteCache::new(10, Duration::from_secs(60));
        cache.put("key", "logic");
        cache.get("key");
        cache.get("missing");
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
