//! Shared cache handle
//!
//! The async face of [`CacheStore`] used by every other component. Locks are held
//! only for the synchronous store call; the memory-budget pass releases the lock
//! and yields between eviction batches.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::snapshot::CacheSnapshot;
use crate::cache::store::Cacheable;
use crate::cache::{CacheNamespace, CacheStats, CacheStore};
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::models::{sitemap_key, SitemapSnapshot, ValidationResult};

#[derive(Debug)]
pub struct AuditCache {
    store: RwLock<CacheStore>,
    eviction_batch_size: usize,
}

impl AuditCache {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self::from_store(CacheStore::new(config, clock), config.eviction_batch_size)
    }

    pub fn from_store(store: CacheStore, eviction_batch_size: usize) -> Self {
        Self {
            store: RwLock::new(store),
            eviction_batch_size: eviction_batch_size.max(1),
        }
    }

    // == Generic Namespace Operations ==
    /// Stores a value, then brings memory back under budget if needed.
    pub async fn set<T: Cacheable>(&self, key: impl Into<String>, value: T, ttl: Option<Duration>) {
        let over_budget = {
            let mut store = self.store.write().await;
            store.set(key, value, ttl);
            store.is_over_budget()
        };
        if over_budget {
            self.enforce_memory_budget().await;
        }
    }

    /// Write lock: a read updates recency and counters.
    pub async fn get<T: Cacheable>(&self, key: &str) -> Option<T> {
        self.store.write().await.get(key)
    }

    pub async fn invalidate(&self, namespace: CacheNamespace, key: &str) -> bool {
        self.store.write().await.invalidate(namespace, key)
    }

    pub async fn invalidate_by_pattern(&self, pattern: &Regex, namespace: Option<CacheNamespace>) -> usize {
        self.store.write().await.invalidate_by_pattern(pattern, namespace)
    }

    pub async fn clear_expired(&self) -> usize {
        self.store.write().await.clear_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub async fn keys(&self, namespace: CacheNamespace) -> Vec<String> {
        self.store.read().await.keys(namespace)
    }

    pub async fn refresh_candidates(&self, namespace: CacheNamespace, ratio: f64) -> Vec<String> {
        self.store.read().await.refresh_candidates(namespace, ratio)
    }

    // == Typed Helpers ==
    pub async fn set_link(&self, result: ValidationResult) {
        let key = result.url.clone();
        self.set(key, result, None).await;
    }

    pub async fn get_link(&self, url: &str) -> Option<ValidationResult> {
        self.get(url).await
    }

    pub async fn set_sitemap(&self, domain: &str, snapshot: SitemapSnapshot) {
        self.set(sitemap_key(domain), snapshot, None).await;
    }

    pub async fn get_sitemap(&self, domain: &str) -> Option<SitemapSnapshot> {
        self.get(&sitemap_key(domain)).await
    }

    pub async fn set_report(&self, key: impl Into<String>, report: serde_json::Value) {
        self.set(key, report, None).await;
    }

    pub async fn get_report(&self, key: &str) -> Option<serde_json::Value> {
        self.get(key).await
    }

    // == Memory Budget ==
    /// Evicts least-recently-accessed entries in batches until under budget.
    ///
    /// Safe to interrupt between batches and to run concurrently with itself.
    pub async fn enforce_memory_budget(&self) -> usize {
        let mut total = 0;
        loop {
            let evicted = {
                let mut store = self.store.write().await;
                if !store.is_over_budget() {
                    break;
                }
                store.evict_lru_batch(self.eviction_batch_size)
            };
            if evicted == 0 {
                break;
            }
            total += evicted;
            debug!("Eviction batch removed {} entries", evicted);
            tokio::task::yield_now().await;
        }

        if total > 0 {
            info!("Memory budget enforced: evicted {} entries", total);
        }
        total
    }

    // == Snapshot ==
    pub async fn snapshot(&self) -> CacheSnapshot {
        self.store.read().await.snapshot()
    }

    /// Restores a snapshot; expired entries are dropped before anything can read them.
    pub async fn restore(&self, snapshot: CacheSnapshot) -> usize {
        let dropped = self.store.write().await.restore(snapshot);
        self.enforce_memory_budget().await;
        dropped
    }
}
