//! Deduplication of logical ingress events.
//!
//! Remembers up to `capacity` [`DedupKey`]s; once full, the oldest key is
//! forgotten first. Both transports deliver at-least-once, so repeats are
//! the steady state rather than an error.

use std::collections::{HashSet, VecDeque};

use cargolink_core::DedupKey;

#[derive(Debug, Clone)]
pub struct DedupEngine {
    capacity: usize,
    seen: HashSet<DedupKey>,
    order: VecDeque<DedupKey>,
}

impl DedupEngine {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn seen(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    /// Remember `key`. Re-marking a known key does not refresh its position.
    pub fn mark_seen(&mut self, key: DedupKey) {
        if self.seen.contains(&key) {
            return;
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(evicted) => {
                    tracing::trace!(key = %evicted, "Evicting dedup key");
                    self.seen.remove(&evicted);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.seen.insert(key);
    }

    /// Check and mark in one step. Returns `true` if `key` was new.
    pub fn insert_if_new(&mut self, key: DedupKey) -> bool {
        if self.seen(&key) {
            return false;
        }
        self.mark_seen(key);
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for DedupEngine {
    fn default() -> Self {
        Self::new(cargolink_core::defaults::DEDUP_CAPACITY)
    }
}
