//! Batch validator
//!
//! Resolves a batch in three steps:
//! 1. cache lookup (fresh hits are returned as-is)
//! 2. local links probed in chunks of `local_concurrency`
//! 3. external links pushed through the shared rate-limited queue
//!
//! Steps 2 and 3 run side by side. A failed probe is a broken result, never an
//! aborted batch; a failed store write is logged and the result still stands.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::AuditCache;
use crate::clock::Clock;
use crate::config::ValidatorConfig;
use crate::models::{ScannedLink, ValidationResult};
use crate::ports::{Prober, Store};
use crate::validator::rate_limit::RateLimitedQueue;
use crate::validator::stats::ValidationStats;
use crate::validator::check_link;

pub struct BatchValidator {
    cache: Arc<AuditCache>,
    prober: Arc<dyn Prober>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    external: Arc<RateLimitedQueue>,
    local_concurrency: usize,
    stats: RwLock<ValidationStats>,
}

impl BatchValidator {
    pub fn new(
        config: &ValidatorConfig,
        cache: Arc<AuditCache>,
        prober: Arc<dyn Prober>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let external = Arc::new(RateLimitedQueue::new(
            Arc::clone(&prober),
            Arc::clone(&clock),
            config.batch_size,
            config.rate_limit_delay(),
        ));

        Self {
            cache,
            prober,
            store,
            clock,
            external,
            local_concurrency: config.local_concurrency.max(1),
            stats: RwLock::new(ValidationStats::default()),
        }
    }

    /// Results come back in input order, cache hits included verbatim.
    pub async fn validate_batch(&self, links: &[ScannedLink]) -> Vec<ValidationResult> {
        self.run(links, true).await
    }

    /// Probes every link regardless of what the cache holds.
    pub async fn revalidate(&self, links: &[ScannedLink]) -> Vec<ValidationResult> {
        self.run(links, false).await
    }

    /// Critical and high links are fully validated before medium and low ones
    /// are started. Results follow the priority-sorted order.
    pub async fn validate_with_priority(&self, links: &[ScannedLink]) -> Vec<ValidationResult> {
        let mut ordered = links.to_vec();
        ordered.sort_by_key(|link| link.priority.rank());
        let split = ordered.partition_point(|link| link.priority.is_urgent());
        let (urgent, rest) = ordered.split_at(split);

        let mut results = self.validate_batch(urgent).await;
        results.extend(self.validate_batch(rest).await);
        results
    }

    pub async fn stats(&self) -> ValidationStats {
        self.stats.read().await.clone()
    }

    pub fn external_queue(&self) -> &Arc<RateLimitedQueue> {
        &self.external
    }

    async fn run(&self, links: &[ScannedLink], use_cache: bool) -> Vec<ValidationResult> {
        if links.is_empty() {
            return Vec::new();
        }

        let mut slots: Vec<Option<ValidationResult>> = vec![None; links.len()];
        // URL -> input positions waiting on the same probe
        let mut waiting: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut local = Vec::new();
        let mut external = Vec::new();
        let mut hits = 0u64;

        for (i, link) in links.iter().enumerate() {
            if let Some(positions) = waiting.get_mut(link.url.as_str()) {
                positions.push(i);
                continue;
            }
            if use_cache {
                if let Some(cached) = self.cache.get_link(&link.url).await {
                    slots[i] = Some(cached);
                    hits += 1;
                    continue;
                }
            }
            waiting.insert(link.url.as_str(), vec![i]);
            if link.link_kind.is_local() {
                local.push(link.clone());
            } else {
                external.push(link.clone());
            }
        }

        debug!(
            "Validating {} links: {} cached, {} local, {} external",
            links.len(),
            hits,
            local.len(),
            external.len()
        );

        let (local_results, external_results) = tokio::join!(
            self.check_local(&local),
            self.external.submit(external.clone())
        );

        let fresh = local
            .iter()
            .zip(local_results)
            .map(|(link, result)| (link, result, true))
            .chain(
                external
                    .iter()
                    .zip(external_results)
                    .map(|(link, result)| (link, result, false)),
            );

        let mut checked = Vec::new();
        for (link, result, is_local) in fresh {
            self.cache.set_link(result.clone()).await;
            if let Err(e) = self.store.upsert_result(link, &result).await {
                warn!("Failed to persist result for {}: {}", link.url, e);
            }
            if let Some(positions) = waiting.get(link.url.as_str()) {
                for &i in positions {
                    slots[i] = Some(result.clone());
                }
            }
            checked.push((result, is_local));
        }

        {
            let mut stats = self.stats.write().await;
            for _ in 0..hits {
                stats.record_cache_hit();
            }
            for (result, is_local) in &checked {
                stats.record_check(result, *is_local);
            }
        }

        slots.into_iter().flatten().collect()
    }

    async fn check_local(&self, links: &[ScannedLink]) -> Vec<ValidationResult> {
        let mut results = Vec::with_capacity(links.len());
        for chunk in links.chunks(self.local_concurrency) {
            let checks = chunk
                .iter()
                .map(|link| check_link(self.prober.as_ref(), link, self.clock.as_ref()));
            results.extend(join_all(checks).await);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::CacheConfig;
    use crate::error::{AuditError, Result};
    use crate::models::{
        AuditJob, AuditMetrics, LinkKind, LinkPriority, LinkStatus, ProbeOutcome,
    };
    use crate::ports::MemoryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    // == Test Helpers ==

    #[derive(Default)]
    struct MockProber {
        calls: Mutex<Vec<(String, LinkKind)>>,
        failing: Vec<String>,
    }

    impl MockProber {
        fn failing(urls: &[&str]) -> Self {
            Self {
                failing: urls.iter().map(|u| u.to_string()).collect(),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, LinkKind)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Prober for MockProber {
        async fn probe(&self, link: &ScannedLink) -> Result<ProbeOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push((link.url.clone(), link.link_kind));
            if self.failing.contains(&link.url) {
                return Err(AuditError::Probe("connection refused".to_string()));
            }
            Ok(ProbeOutcome::valid(Some(200), 5))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl Store for FailingStore {
        async fn upsert_result(&self, _: &ScannedLink, _: &ValidationResult) -> Result<()> {
            Err(AuditError::Store("database unreachable".to_string()))
        }
        async fn record_job(&self, _: &AuditJob) -> Result<()> {
            Err(AuditError::Store("database unreachable".to_string()))
        }
        async fn broken_links(&self) -> Result<Vec<ScannedLink>> {
            Err(AuditError::Store("database unreachable".to_string()))
        }
        async fn latest_metrics(&self) -> Result<AuditMetrics> {
            Err(AuditError::Store("database unreachable".to_string()))
        }
    }

    fn config() -> ValidatorConfig {
        ValidatorConfig {
            rate_limit_delay_ms: 0,
            ..ValidatorConfig::default()
        }
    }

    fn setup(prober: Arc<MockProber>, store: Arc<dyn Store>) -> (BatchValidator, Arc<AuditCache>) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Arc::new(AuditCache::new(&CacheConfig::default(), Arc::clone(&clock)));
        let validator = BatchValidator::new(&config(), Arc::clone(&cache), prober, store, clock);
        (validator, cache)
    }

    fn link(url: &str, kind: LinkKind, priority: LinkPriority) -> ScannedLink {
        ScannedLink::new(url, kind, priority)
    }

    // == Categorization ==

    #[tokio::test]
    async fn test_batch_categorization_and_cache_hits() {
        let prober = Arc::new(MockProber::default());
        let (validator, cache) = setup(prober.clone(), Arc::new(MemoryStore::new()));

        let cached = ValidationResult::from_outcome(
            "https://cached.test/",
            ProbeOutcome::redirect(301, "https://cached.test/new", 12),
            Utc::now(),
        );
        cache.set_link(cached.clone()).await;

        let links = vec![
            link("/a", LinkKind::Internal, LinkPriority::Medium),
            link("https://one.test/", LinkKind::External, LinkPriority::Medium),
            link("/files/b.pdf", LinkKind::Download, LinkPriority::Medium),
            link("https://cached.test/", LinkKind::External, LinkPriority::Medium),
            link("#c", LinkKind::Anchor, LinkPriority::Medium),
            link("https://two.test/", LinkKind::External, LinkPriority::Medium),
        ];

        let results = validator.validate_batch(&links).await;
        assert_eq!(results.len(), 6);
        assert_eq!(results[3], cached);

        let calls = prober.calls();
        let local = calls.iter().filter(|(_, k)| k.is_local()).count();
        let external = calls.iter().filter(|(_, k)| !k.is_local()).count();
        assert_eq!(local, 3);
        assert_eq!(external, 2);
        assert!(!calls.iter().any(|(u, _)| u == "https://cached.test/"));

        let stats = validator.stats().await;
        assert_eq!(stats.total, 6);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.local_checks, 3);
        assert_eq!(stats.external_checks, 2);
    }

    #[tokio::test]
    async fn test_results_in_input_order() {
        let prober = Arc::new(MockProber::default());
        let (validator, _) = setup(prober, Arc::new(MemoryStore::new()));

        let links = vec![
            link("https://x.test/", LinkKind::External, LinkPriority::Low),
            link("/y", LinkKind::Internal, LinkPriority::Low),
            link("https://z.test/", LinkKind::External, LinkPriority::Low),
        ];
        let urls: Vec<_> = validator
            .validate_batch(&links)
            .await
            .into_iter()
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec!["https://x.test/", "/y", "https://z.test/"]);
    }

    #[tokio::test]
    async fn test_second_batch_served_from_cache() {
        let prober = Arc::new(MockProber::default());
        let store = Arc::new(MemoryStore::new());
        let (validator, _) = setup(prober.clone(), store.clone());

        let links = vec![
            link("/a", LinkKind::Internal, LinkPriority::High),
            link("https://b.test/", LinkKind::External, LinkPriority::High),
        ];
        validator.validate_batch(&links).await;
        validator.validate_batch(&links).await;

        assert_eq!(prober.calls().len(), 2);
        assert_eq!(store.result_count().await, 2);
        assert_eq!(validator.stats().await.cache_hits, 2);
    }

    #[tokio::test]
    async fn test_revalidate_ignores_cache() {
        let prober = Arc::new(MockProber::default());
        let (validator, _) = setup(prober.clone(), Arc::new(MemoryStore::new()));

        let links = vec![link("/a", LinkKind::Internal, LinkPriority::High)];
        validator.validate_batch(&links).await;
        validator.revalidate(&links).await;

        assert_eq!(prober.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_urls_probed_once() {
        let prober = Arc::new(MockProber::default());
        let (validator, _) = setup(prober.clone(), Arc::new(MemoryStore::new()));

        let links = vec![
            link("/dup", LinkKind::Internal, LinkPriority::Low),
            link("/dup", LinkKind::Internal, LinkPriority::Low),
        ];
        let results = validator.validate_batch(&links).await;
        assert_eq!(results.len(), 2);
        assert_eq!(prober.calls().len(), 1);
    }

    // == Priority ==

    #[tokio::test]
    async fn test_priority_call_order() {
        let prober = Arc::new(MockProber::default());
        let (validator, _) = setup(prober.clone(), Arc::new(MemoryStore::new()));

        let links = vec![
            link("/low", LinkKind::Internal, LinkPriority::Low),
            link("https://critical.test/", LinkKind::External, LinkPriority::Critical),
            link("/medium", LinkKind::Internal, LinkPriority::Medium),
            link("/high", LinkKind::Internal, LinkPriority::High),
        ];

        let results = validator.validate_with_priority(&links).await;
        let order: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(order, vec!["https://critical.test/", "/high", "/medium", "/low"]);

        let calls: Vec<_> = prober.calls().into_iter().map(|(u, _)| u).collect();
        assert_eq!(calls.len(), 4);
        let first_two: Vec<_> = calls[..2].to_vec();
        assert!(first_two.contains(&"https://critical.test/".to_string()));
        assert!(first_two.contains(&"/high".to_string()));
        assert_eq!(&calls[2..], &["/medium".to_string(), "/low".to_string()]);
    }

    // == Failure Semantics ==

    #[tokio::test]
    async fn test_probe_error_is_broken_result() {
        let prober = Arc::new(MockProber::failing(&["https://down.test/"]));
        let (validator, cache) = setup(prober, Arc::new(MemoryStore::new()));

        let links = vec![
            link("https://down.test/", LinkKind::External, LinkPriority::High),
            link("https://up.test/", LinkKind::External, LinkPriority::High),
        ];
        let results = validator.validate_batch(&links).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, LinkStatus::Broken);
        assert!(results[0]
            .error_detail
            .as_deref()
            .unwrap()
            .contains("connection refused"));
        assert_eq!(results[1].status, LinkStatus::Valid);

        // Failures are cached like any other result
        assert!(cache.get_link("https://down.test/").await.is_some());

        let stats = validator.stats().await;
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.valid, 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let prober = Arc::new(MockProber::default());
        let (validator, cache) = setup(prober, Arc::new(FailingStore));

        let links = vec![link("/a", LinkKind::Internal, LinkPriority::High)];
        let results = validator.validate_batch(&links).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, LinkStatus::Valid);
        assert!(cache.get_link("/a").await.is_some());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let prober = Arc::new(MockProber::default());
        let (validator, _) = setup(prober.clone(), Arc::new(MemoryStore::new()));
        assert!(validator.validate_batch(&[]).await.is_empty());
        assert!(prober.calls().is_empty());
    }
}
