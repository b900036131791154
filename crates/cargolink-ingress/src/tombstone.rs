//! Time-bounded record of recently cancelled or expired broadcast ids.
//!
//! Expiry is a read-time comparison. [`TombstoneStore::purge_expired`] only
//! bounds memory: it never changes what [`TombstoneStore::has`] reports for
//! lookups at or after the purge time, as long as both use the same clock.

use std::collections::HashMap;

/// Tombstones keyed by normalized broadcast id.
#[derive(Debug, Clone)]
pub struct TombstoneStore {
    ttl_ms: i64,
    created_at: HashMap<String, i64>,
}

impl TombstoneStore {
    pub fn new(ttl_ms: i64) -> Self {
        Self {
            ttl_ms,
            created_at: HashMap::new(),
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Record (or refresh) a tombstone for `id` created at `now_ms`.
    pub fn add(&mut self, id: &str, now_ms: i64) {
        self.created_at.insert(id.to_string(), now_ms);
    }

    /// True iff a tombstone exists and `now_ms - created <= ttl`.
    pub fn has(&self, id: &str, now_ms: i64) -> bool {
        self.created_at
            .get(id)
            .map(|created| now_ms.saturating_sub(*created) <= self.ttl_ms)
            .unwrap_or(false)
    }

    /// Drop tombstones that can no longer match. Returns how many were removed.
    pub fn purge_expired(&mut self, now_ms: i64) -> usize {
        let before = self.created_at.len();
        let ttl = self.ttl_ms;
        self.created_at
            .retain(|_, created| now_ms.saturating_sub(*created) <= ttl);
        before - self.created_at.len()
    }

    pub fn len(&self) -> usize {
        self.created_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created_at.is_empty()
    }

    pub fn clear(&mut self) {
        self.created_at.clear();
    }
}

impl Default for TombstoneStore {
    fn default() -> Self {
        Self::new(cargolink_core::defaults::TOMBSTONE_TTL_MS)
    }
}
