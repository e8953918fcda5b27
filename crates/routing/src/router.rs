//! Message router: msg_id → service name → consistent-hash instance
//! selection, with a route cache and unhealthy-instance failover.

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use dashmap::{DashMap, DashSet};
use gg_protocol::service_for_msg_id;
use gg_service_traits::ServiceInstance;
use tracing::{debug, info, warn};

use crate::{
    cache::{RouteCache, RouteCacheStats},
    error::{Error, Result},
    ring::ConsistentHashRing,
};

#[derive(Default, Clone, Copy)]
pub struct RouterStats {
    pub total_routes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub failed_routes: u64,
}

struct ServiceRing {
    ring: ArcSwap<ConsistentHashRing>,
    instances: DashMap<String, ServiceInstance>,
    unhealthy: DashSet<String>,
}

impl ServiceRing {
    fn new() -> Self {
        Self { ring: ArcSwap::new(Arc::new(ConsistentHashRing::with_default_replicas())), instances: DashMap::new(), unhealthy: DashSet::new() }
    }

    fn rebuild(&self) {
        let mut ring = ConsistentHashRing::with_default_replicas();
        for entry in self.instances.iter() {
            ring.add_instance(entry.value());
        }
        self.ring.store(Arc::new(ring));
    }

    fn eligible(&self) -> DashSet<String> {
        let set = DashSet::new();
        for entry in self.instances.iter() {
            if !self.unhealthy.contains(entry.key()) {
                set.insert(entry.key().clone());
            }
        }
        set
    }
}

/// Routes business messages to a backend instance by msg_id and player_id,
/// using a consistent-hash ring per service and a TTL'd resolution cache.
pub struct MessageRouter {
    rings: DashMap<String, ServiceRing>,
    cache: RouteCache,
    stats: parking_lot::Mutex<RouterStats>,
}

impl MessageRouter {
    pub fn new(cache_size: usize, cache_ttl: Duration) -> Self {
        Self { rings: DashMap::new(), cache: RouteCache::new(cache_size, cache_ttl), stats: parking_lot::Mutex::new(RouterStats::default()) }
    }

    pub fn register_instance(&self, service_name: &str, instance: ServiceInstance) {
        let entry = self.rings.entry(service_name.to_string()).or_insert_with(ServiceRing::new);
        entry.instances.insert(instance.id.clone(), instance.clone());
        entry.rebuild();
        info!(service_name, instance_id = %instance.id, "registered service instance");
    }

    pub fn unregister_instance(&self, service_name: &str, instance_id: &str) {
        if let Some(entry) = self.rings.get(service_name) {
            entry.instances.remove(instance_id);
            entry.unhealthy.remove(instance_id);
            entry.rebuild();
            info!(service_name, instance_id, "unregistered service instance");
        }
    }

    pub fn mark_unhealthy(&self, service_name: &str, instance_id: &str) {
        if let Some(entry) = self.rings.get(service_name) {
            entry.unhealthy.insert(instance_id.to_string());
            warn!(service_name, instance_id, "marked instance unhealthy");
        }
    }

    pub fn mark_healthy(&self, service_name: &str, instance_id: &str) {
        if let Some(entry) = self.rings.get(service_name) {
            entry.unhealthy.remove(instance_id);
        }
    }

    /// Resolve a business `msg_id` + `player_id` to a target instance and
    /// the service name it was routed to.
    pub fn route(&self, msg_id: i64, player_id: &str) -> Result<(String, ServiceInstance)> {
        self.stats.lock().total_routes += 1;

        let cache_key = format!("{msg_id}:{player_id}");
        let service_name = if let Some(cached) = self.cache.get(&cache_key) {
            self.stats.lock().cache_hits += 1;
            cached
        } else {
            self.stats.lock().cache_misses += 1;
            let service_name = service_for_msg_id(msg_id).map_err(|_| Error::UnknownMessageId(msg_id))?.as_str().to_string();
            self.cache.put(&cache_key, &service_name);
            service_name
        };

        let instance = self.select_instance(&service_name, player_id).inspect_err(|_| {
            self.stats.lock().failed_routes += 1;
        })?;
        Ok((service_name, instance))
    }

    /// Never returns an unhealthy instance: if every instance in the ring
    /// has been marked unhealthy, this errors rather than degrading to an
    /// unfiltered pick.
    fn select_instance(&self, service_name: &str, player_id: &str) -> Result<ServiceInstance> {
        let entry = self.rings.get(service_name).ok_or_else(|| Error::NoHealthyInstance(service_name.to_string()))?;

        let hash_key = if player_id.is_empty() { cache_stamp() } else { player_id.to_string() };
        let eligible = entry.eligible();
        let ring = entry.ring.load();

        ring.get_instance(&hash_key, &eligible).cloned().ok_or_else(|| {
            debug!(service_name, "no eligible healthy instance");
            Error::NoHealthyInstance(service_name.to_string())
        })
    }

    pub fn route_cache_stats(&self) -> RouteCacheStats {
        self.cache.stats()
    }

    pub fn clear_expired_cache(&self) -> usize {
        self.cache.clear_expired()
    }

    pub fn stats(&self) -> RouterStats {
        *self.stats.lock()
    }
}

fn cache_stamp() -> String {
    format!("{:?}", std::time::Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str) -> ServiceInstance {
        ServiceInstance::new(id, "10.0.0.1", 9000)
    }

    #[test]
    fn routes_by_msg_id_range() {
        let router = MessageRouter::new(100, Duration::from_secs(60));
        router.register_instance("logic", instance("logic-1"));

        let (service_name, routed) = router.route(1001, "player-1").unwrap();
        assert_eq!(service_name, "logic");
        assert_eq!(routed.id, "logic-1");
    }

    #[test]
    fn unknown_msg_id_errors() {
        let router = MessageRouter::new(100, Duration::from_secs(60));
        assert!(matches!(router.route(42, "player-1"), Err(Error::UnknownMessageId(42))));
    }

    #[test]
    fn same_player_routes_consistently() {
        let router = MessageRouter::new(100, Duration::from_secs(60));
        router.register_instance("logic", instance("logic-1"));
        router.register_instance("logic", instance("logic-2"));

        let first = router.route(1001, "player-7").unwrap().1.id;
        let second = router.route(1050, "player-7").unwrap().1.id;
        assert_eq!(first, second);
    }

    #[test]
    fn unhealthy_instance_is_skipped() {
        let router = MessageRouter::new(100, Duration::from_secs(60));
        router.register_instance("logic", instance("logic-1"));
        router.register_instance("logic", instance("logic-2"));
        router.mark_unhealthy("logic", "logic-1");

        for player in ["p1", "p2", "p3", "p4"] {
            let (_, routed) = router.route(1001, player).unwrap();
            assert_eq!(routed.id, "logic-2");
        }
    }

    #[test]
    fn no_instances_is_no_healthy_instance_error() {
        let router = MessageRouter::new(100, Duration::from_secs(60));
        assert!(matches!(router.route(1001, "player-1"), Err(Error::NoHealthyInstance(_))));
    }

    #[test]
    fn all_instances_unhealthy_errors_instead_of_degrading() {
        let router = MessageRouter::new(100, Duration::from_secs(60));
        router.register_instance("logic", instance("logic-1"));
        router.register_instance("logic", instance("logic-2"));
        router.mark_unhealthy("logic", "logic-1");
        router.mark_unhealthy("logic", "logic-2");

        assert!(matches!(router.route(1001, "player-1"), Err(Error::NoHealthyInstance(_))));
    }

    #[test]
    fn stats_track_cache_hits_and_misses() {
        let router = MessageRouter::new(100, Duration::from_secs(60));
        router.register_instance("logic", instance("logic-1"));
        router.route(1001, "player-1").unwrap();
        router.route(1001, "player-1").unwrap();

        let stats = router.stats();
        assert_eq!(stats.total_routes, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }
}
