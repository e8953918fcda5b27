//! Sliding-window deduplication of inbound business messages.

use std::{
    collections::{HashSet, VecDeque},
    time::{Duration, Instant},
};

use xxhash_rust::xxh3::xxh3_64;

struct WindowEntry {
    fingerprint: u64,
    inserted_at: Instant,
}

/// Fixed-size, TTL'd window of message fingerprints.
///
/// A message is a duplicate if its fingerprint is already in the window.
/// The window evicts the oldest entry both on insertion past capacity and
/// opportunistically on TTL expiry during `check_and_insert`.
pub struct DedupWindow {
    capacity: usize,
    ttl: Duration,
    order: parking_lot::Mutex<VecDeque<WindowEntry>>,
    seen: parking_lot::Mutex<HashSet<u64>>,
}

impl DedupWindow {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl, order: parking_lot::Mutex::new(VecDeque::with_capacity(capacity)), seen: parking_lot::Mutex::new(HashSet::new()) }
    }

    pub fn fingerprint(msg_id: i64, sequence: &str, player_id: &str) -> u64 {
        xxh3_64(format!("{msg_id}:{sequence}:{player_id}").as_bytes())
    }

    /// Returns `true` if the fingerprint was already present (duplicate,
    /// rejected); `false` if it was newly inserted.
    pub fn check_and_insert(&self, fingerprint: u64) -> bool {
        self.evict_expired();

        let mut seen = self.seen.lock();
        if seen.contains(&fingerprint) {
            return true;
        }

        let mut order = self.order.lock();
        if order.len() >= self.capacity {
            if let Some(evicted) = order.pop_front() {
                seen.remove(&evicted.fingerprint);
            }
        }
        order.push_back(WindowEntry { fingerprint, inserted_at: Instant::now() });
        seen.insert(fingerprint);
        false
    }

    fn evict_expired(&self) {
        let mut order = self.order.lock();
        let mut seen = self.seen.lock();
        while let Some(front) = order.front() {
            if front.inserted_at.elapsed() > self.ttl {
                let evicted = order.pop_front().expect("front() just returned Some");
                seen.remove(&evicted.fingerprint);
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_is_not_a_duplicate() {
        let window = DedupWindow::new(10, Duration::from_secs(60));
        let fp = DedupWindow::fingerprint(1001, "seq-1", "player-1");
        assert!(!window.check_and_insert(fp));
    }

    #[test]
    fn repeat_fingerprint_is_rejected() {
        let window = DedupWindow::new(10, Duration::from_secs(60));
        let fp = DedupWindow::fingerprint(1001, "seq-1", "player-1");
        window.check_and_insert(fp);
        assert!(window.check_and_insert(fp));
    }

    #[test]
    fn capacity_overflow_evicts_oldest() {
        let window = DedupWindow::new(2, Duration::from_secs(60));
        let a = DedupWindow::fingerprint(1, "a", "p");
        let b = DedupWindow::fingerprint(2, "b", "p");
        let c = DedupWindow::fingerprint(3, "c", "p");

        window.check_and_insert(a);
        window.check_and_insert(b);
        window.check_and_insert(c);

        assert!(!window.check_and_insert(a));
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn ttl_expiry_allows_reinsertion() {
        let window = DedupWindow::new(10, Duration::from_millis(10));
        let fp = DedupWindow::fingerprint(1001, "seq-1", "player-1");
        window.check_and_insert(fp);
        std::thread::sleep(Duration::from_millis(30));
        assert!(!window.check_and_insert(fp));
    }
}
