//! Cache Store Module
//!
//! Main cache engine: namespaced HashMap storage, one global LRU order, lazy and
//! eager TTL expiry, and memory-budget eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;

use crate::cache::snapshot::{CacheSnapshot, NamespaceMaps, SNAPSHOT_VERSION};
use crate::cache::{CacheEntry, CacheNamespace, CacheStats, LruTracker};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::models::{SitemapSnapshot, ValidationResult};

/// Identifies an entry across namespaces.
pub type EntryKey = (CacheNamespace, String);

// == Cacheable ==
/// A value type bound to exactly one namespace.
pub trait Cacheable: Clone + Send + Sync + 'static {
    const NAMESPACE: CacheNamespace;

    fn slot(maps: &NamespaceMaps) -> &HashMap<String, CacheEntry<Self>>;
    fn slot_mut(maps: &mut NamespaceMaps) -> &mut HashMap<String, CacheEntry<Self>>;
}

impl Cacheable for ValidationResult {
    const NAMESPACE: CacheNamespace = CacheNamespace::Links;

    fn slot(maps: &NamespaceMaps) -> &HashMap<String, CacheEntry<Self>> {
        &maps.links
    }

    fn slot_mut(maps: &mut NamespaceMaps) -> &mut HashMap<String, CacheEntry<Self>> {
        &mut maps.links
    }
}

impl Cacheable for SitemapSnapshot {
    const NAMESPACE: CacheNamespace = CacheNamespace::Sitemap;

    fn slot(maps: &NamespaceMaps) -> &HashMap<String, CacheEntry<Self>> {
        &maps.sitemap
    }

    fn slot_mut(maps: &mut NamespaceMaps) -> &mut HashMap<String, CacheEntry<Self>> {
        &mut maps.sitemap
    }
}

impl Cacheable for serde_json::Value {
    const NAMESPACE: CacheNamespace = CacheNamespace::Reports;

    fn slot(maps: &NamespaceMaps) -> &HashMap<String, CacheEntry<Self>> {
        &maps.reports
    }

    fn slot_mut(maps: &mut NamespaceMaps) -> &mut HashMap<String, CacheEntry<Self>> {
        &mut maps.reports
    }
}

/// Key and lifetime of an entry, independent of its value type.
#[derive(Debug, Clone)]
struct EntryMeta {
    key: String,
    created_at: u64,
    ttl_ms: u64,
    last_accessed_at: u64,
}

fn collect_meta<T>(map: &HashMap<String, CacheEntry<T>>) -> Vec<EntryMeta> {
    map.iter()
        .map(|(key, entry)| EntryMeta {
            key: key.clone(),
            created_at: entry.created_at,
            ttl_ms: entry.ttl_ms,
            last_accessed_at: entry.last_accessed_at,
        })
        .collect()
}

// == Cache Store ==
/// Namespaced TTL storage with a shared memory budget.
#[derive(Debug)]
pub struct CacheStore {
    maps: NamespaceMaps,
    /// Access order across every namespace
    lru: LruTracker<EntryKey>,
    stats: CacheStats,
    link_ttl_ms: u64,
    sitemap_ttl_ms: u64,
    report_ttl_ms: u64,
    max_memory_bytes: u64,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store using the namespace TTLs and memory budget from `config`.
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            maps: NamespaceMaps::default(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            link_ttl_ms: config.link_results_ttl * 1000,
            sitemap_ttl_ms: config.sitemap_data_ttl * 1000,
            report_ttl_ms: config.report_data_ttl * 1000,
            max_memory_bytes: config.max_memory_bytes(),
            clock,
        }
    }

    /// Overrides the memory budget (bytes).
    pub fn with_memory_budget(mut self, max_memory_bytes: u64) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    pub fn default_ttl(&self, namespace: CacheNamespace) -> Duration {
        Duration::from_millis(self.default_ttl_ms(namespace))
    }

    fn default_ttl_ms(&self, namespace: CacheNamespace) -> u64 {
        match namespace {
            CacheNamespace::Links => self.link_ttl_ms,
            CacheNamespace::Sitemap => self.sitemap_ttl_ms,
            CacheNamespace::Reports => self.report_ttl_ms,
        }
    }

    // == Set ==
    /// Stores a value in its namespace, replacing any previous entry.
    ///
    /// # Arguments
    /// * `key` - Entry key within the namespace
    /// * `value` - The value to store
    /// * `ttl` - Optional TTL (namespace default if None)
    ///
    /// Does not evict; callers check [`CacheStore::is_over_budget`].
    pub fn set<T: Cacheable>(&mut self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let key = key.into();
        let ttl_ms = ttl
            .map(|d| d.as_millis() as u64)
            .unwrap_or_else(|| self.default_ttl_ms(T::NAMESPACE));
        let now = self.clock.now_ms();

        T::slot_mut(&mut self.maps).insert(key.clone(), CacheEntry::new(value, ttl_ms, now));
        self.lru.touch((T::NAMESPACE, key));
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Expired entries are removed on the spot and counted as misses.
    pub fn get<T: Cacheable>(&mut self, key: &str) -> Option<T> {
        let now = self.clock.now_ms();
        let slot = T::slot_mut(&mut self.maps);

        let expired = match slot.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            slot.remove(key);
            self.lru.remove(&(T::NAMESPACE, key.to_string()));
            self.stats.record_expired(1);
            self.stats.record_miss();
            return None;
        }

        let entry = slot.get_mut(key)?;
        entry.touch(now);
        let data = entry.data.clone();
        self.lru.touch((T::NAMESPACE, key.to_string()));
        self.stats.record_hit();
        Some(data)
    }

    /// Reads an entry's envelope without touching access metadata or counters.
    pub fn peek_entry<T: Cacheable>(&self, key: &str) -> Option<&CacheEntry<T>> {
        T::slot(&self.maps).get(key)
    }

    // == Invalidate ==
    /// Removes one entry. Returns false when the key was already absent.
    pub fn invalidate(&mut self, namespace: CacheNamespace, key: &str) -> bool {
        let removed = match namespace {
            CacheNamespace::Links => self.maps.links.remove(key).is_some(),
            CacheNamespace::Sitemap => self.maps.sitemap.remove(key).is_some(),
            CacheNamespace::Reports => self.maps.reports.remove(key).is_some(),
        };
        if removed {
            self.lru.remove(&(namespace, key.to_string()));
        }
        removed
    }

    /// Removes every entry whose key matches `pattern`, in one namespace or all.
    pub fn invalidate_by_pattern(&mut self, pattern: &Regex, namespace: Option<CacheNamespace>) -> usize {
        let namespaces = match namespace {
            Some(ns) => vec![ns],
            None => CacheNamespace::ALL.to_vec(),
        };

        let mut removed = 0;
        for ns in namespaces {
            let keys: Vec<String> = self
                .entry_meta(ns)
                .into_iter()
                .filter(|meta| pattern.is_match(&meta.key))
                .map(|meta| meta.key)
                .collect();
            for key in keys {
                if self.invalidate(ns, &key) {
                    removed += 1;
                }
            }
        }
        removed
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from every namespace.
    ///
    /// Returns the number of entries removed.
    pub fn clear_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;

        for ns in CacheNamespace::ALL {
            let expired: Vec<String> = self
                .entry_meta(ns)
                .into_iter()
                .filter(|meta| now.saturating_sub(meta.created_at) > meta.ttl_ms)
                .map(|meta| meta.key)
                .collect();
            for key in expired {
                if self.invalidate(ns, &key) {
                    removed += 1;
                }
            }
        }

        self.stats.record_expired(removed);
        removed
    }

    // == Memory Accounting ==
    pub fn estimated_memory_bytes(&self) -> u64 {
        CacheNamespace::ALL
            .iter()
            .map(|ns| self.len_of(*ns) as u64 * ns.estimated_entry_bytes())
            .sum()
    }

    pub fn is_over_budget(&self) -> bool {
        self.estimated_memory_bytes() > self.max_memory_bytes
    }

    // == Evict ==
    /// Evicts up to `max` globally least-recently-accessed entries while over budget.
    ///
    /// Returns how many were evicted; 0 once under budget.
    pub fn evict_lru_batch(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while evicted < max && self.is_over_budget() {
            let Some((ns, key)) = self.lru.pop_oldest() else {
                break;
            };
            let removed = match ns {
                CacheNamespace::Links => self.maps.links.remove(&key).is_some(),
                CacheNamespace::Sitemap => self.maps.sitemap.remove(&key).is_some(),
                CacheNamespace::Reports => self.maps.reports.remove(&key).is_some(),
            };
            if removed {
                evicted += 1;
            }
        }
        self.stats.record_evictions(evicted);
        evicted
    }

    // == Refresh Candidates ==
    /// Keys that are expired or within `ratio` of their TTL from expiring.
    pub fn refresh_candidates(&self, namespace: CacheNamespace, ratio: f64) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut keys: Vec<String> = self
            .entry_meta(namespace)
            .into_iter()
            .filter(|meta| {
                let remaining = (meta.created_at + meta.ttl_ms).saturating_sub(now);
                remaining as f64 <= meta.ttl_ms as f64 * ratio
            })
            .map(|meta| meta.key)
            .collect();
        keys.sort();
        keys
    }

    pub fn keys(&self, namespace: CacheNamespace) -> Vec<String> {
        let mut keys: Vec<String> = self.entry_meta(namespace).into_iter().map(|m| m.key).collect();
        keys.sort();
        keys
    }

    fn entry_meta(&self, namespace: CacheNamespace) -> Vec<EntryMeta> {
        match namespace {
            CacheNamespace::Links => collect_meta(&self.maps.links),
            CacheNamespace::Sitemap => collect_meta(&self.maps.sitemap),
            CacheNamespace::Reports => collect_meta(&self.maps.reports),
        }
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.link_entries = self.maps.links.len();
        stats.sitemap_entries = self.maps.sitemap.len();
        stats.report_entries = self.maps.reports.len();
        stats.total_entries = self.maps.len();
        stats.estimated_memory_bytes = self.estimated_memory_bytes();
        stats.max_memory_bytes = self.max_memory_bytes;
        stats
    }

    // == Snapshot ==
    /// Copies every namespace and the counters.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: self.clock.now_ms(),
            entries: self.maps.clone(),
            hits: self.stats.hits,
            misses: self.stats.misses,
            evictions: self.stats.evictions,
        }
    }

    /// Replaces the contents with `snapshot`, then drops anything already expired.
    ///
    /// Returns the number of restored-but-expired entries removed.
    pub fn restore(&mut self, snapshot: CacheSnapshot) -> usize {
        self.maps = snapshot.entries;
        self.stats = CacheStats {
            hits: snapshot.hits,
            misses: snapshot.misses,
            evictions: snapshot.evictions,
            ..CacheStats::new()
        };

        // Rebuild recency from the persisted access times
        let mut order: Vec<(u64, CacheNamespace, String)> = CacheNamespace::ALL
            .iter()
            .flat_map(|ns| {
                self.entry_meta(*ns)
                    .into_iter()
                    .map(move |meta| (meta.last_accessed_at, *ns, meta.key))
            })
            .collect();
        order.sort();

        self.lru.clear();
        for (_, ns, key) in order {
            self.lru.touch((ns, key));
        }

        self.clear_expired()
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn len_of(&self, namespace: CacheNamespace) -> usize {
        match namespace {
            CacheNamespace::Links => self.maps.links.len(),
            CacheNamespace::Sitemap => self.maps.sitemap.len(),
            CacheNamespace::Reports => self.maps.reports.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}
