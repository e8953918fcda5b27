//! Consistent hash ring with virtual nodes.
//!
//! Hashing uses MD5 over the full 128-bit digest rather than a 64-bit hash,
//! matching the placement an existing Python gateway computes so a
//! migrated deployment keeps routing the same keys to the same instances.

use std::collections::BTreeMap;

use gg_service_traits::ServiceInstance;
use md5::{Digest, Md5};

const DEFAULT_REPLICAS: u32 = 160;

fn hash128(input: &str) -> u128 {
    let digest = Md5::digest(input.as_bytes());
    u128::from_be_bytes(digest.into())
}

/// Ring of virtual nodes for one backend service.
///
/// Cheap to clone (virtual node count is small relative to how often the
/// ring is read), so callers rebuild a new ring and swap it in with
/// `ArcSwap` rather than locking for every read.
#[derive(Clone, Default)]
pub struct ConsistentHashRing {
    nodes: BTreeMap<u128, ServiceInstance>,
    replicas: u32,
}

impl ConsistentHashRing {
    pub fn new(replicas: u32) -> Self {
        Self { nodes: BTreeMap::new(), replicas }
    }

    pub fn with_default_replicas() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_instance(&mut self, instance: &ServiceInstance) {
        for vnode in 0..self.replicas {
            let key = hash128(&format!("{}:{vnode}", instance.address()));
            self.nodes.insert(key, instance.clone());
        }
    }

    pub fn remove_instance(&mut self, instance_id: &str) {
        self.nodes.retain(|_, inst| inst.id != instance_id);
    }

    /// Walk the ring clockwise from `key`'s hash, returning the first
    /// instance whose id is in `eligible` (the caller's current healthy
    /// set — an instance can be on the ring but temporarily excluded).
    pub fn get_instance<'a>(&'a self, key: &str, eligible: &dashmap::DashSet<String>) -> Option<&'a ServiceInstance> {
        if self.nodes.is_empty() {
            return None;
        }
        let target = hash128(key);
        self.nodes
            .range(target..)
            .chain(self.nodes.iter())
            .map(|(_, inst)| inst)
            .find(|inst| eligible.contains(&inst.id))
    }

    /// Same walk, without a health filter — used when nothing is marked
    /// unhealthy so callers can skip building an eligibility set.
    pub fn get_instance_any(&self, key: &str) -> Option<&ServiceInstance> {
        if self.nodes.is_empty() {
            return None;
        }
        let target = hash128(key);
        self.nodes.range(target..).next().or_else(|| self.nodes.iter().next()).map(|(_, inst)| inst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str) -> ServiceInstance {
        ServiceInstance::new(id, "10.0.0.1", 9000)
    }

    #[test]
    fn same_key_maps_to_same_instance() {
        let mut ring = ConsistentHashRing::new(16);
        ring.add_instance(&instance("a"));
        ring.add_instance(&instance("b"));
        ring.add_instance(&instance("c"));

        let first = ring.get_instance_any("player-42").unwrap().id.clone();
        let second = ring.get_instance_any("player-42").unwrap().id.clone();
        assert_eq!(first, second);
    }

    #[test]
    fn removing_instance_redistributes_its_keys() {
        let mut ring = ConsistentHashRing::new(32);
        ring.add_instance(&instance("a"));
        ring.add_instance(&instance("b"));

        let before = ring.get_instance_any("some-key").unwrap().id.clone();
        ring.remove_instance(&before);

        let after = ring.get_instance_any("some-key").unwrap();
        assert_ne!(after.id, before);
    }

    #[test]
    fn empty_ring_returns_none() {
        let ring = ConsistentHashRing::new(8);
        assert!(ring.get_instance_any("key").is_none());
    }

    #[test]
    fn eligible_filter_skips_unhealthy_instances() {
        let mut ring = ConsistentHashRing::new(32);
        ring.add_instance(&instance("a"));
        ring.add_instance(&instance("b"));

        let eligible: dashmap::DashSet<String> = dashmap::DashSet::new();
        eligible.insert("b".to_string());

        for key in ["k1", "k2", "k3", "k4"] {
            let selected = ring.get_instance(key, &eligible).unwrap();
            assert_eq!(selected.id, "b");
        }
    }
}
