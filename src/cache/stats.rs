//! Cache Statistics Module
//!
//! Counters kept by the cache store, plus the per-namespace entry counts and
//! memory estimate filled in when a snapshot of them is taken.

use serde::{Deserialize, Serialize};

// == Cache Stats ==
/// Point-in-time cache metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered by a live entry
    pub hits: u64,
    /// Lookups for absent or expired keys
    pub misses: u64,
    /// Number of entries evicted for the memory budget
    pub evictions: u64,
    /// Number of entries removed because their TTL elapsed
    pub expired_removed: u64,
    pub total_entries: usize,
    pub link_entries: usize,
    pub sitemap_entries: usize,
    pub report_entries: usize,
    /// Estimated bytes held (fixed per-entry estimate per namespace)
    pub estimated_memory_bytes: u64,
    pub max_memory_bytes: u64,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Share of lookups served from cache. 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.lookups())
    }

    pub fn miss_rate(&self) -> f64 {
        ratio(self.misses, self.lookups())
    }

    /// Estimated memory as a fraction of the configured budget.
    pub fn memory_utilization(&self) -> f64 {
        ratio(self.estimated_memory_bytes, self.max_memory_bytes)
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expired(&mut self, count: usize) {
        self.expired_removed += count as u64;
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
