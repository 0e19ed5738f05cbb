//! Invalidation manager
//!
//! Applies rule-matched events to the cache and keeps the refresh queue that
//! re-populates what was purged. Per-namespace invalidation is independent: one
//! namespace finding nothing to remove never stops the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{AuditCache, CacheNamespace, REFRESH_THRESHOLD_RATIO};
use crate::clock::Clock;
use crate::error::{AuditError, Result};
use crate::invalidation::audit_log::{InvalidationLog, InvalidationRecord, InvalidationStats};
use crate::invalidation::refresh::{RefreshItem, RefreshQueue, RefreshStrategy, RefreshTarget};
use crate::invalidation::rules::{CompiledRule, RuleSet};
use crate::models::{sitemap_key, EventKind, InvalidationEvent, InvalidationRule, ScannedLink};
use crate::ports::SitemapFetcher;
use crate::validator::BatchValidator;

const SITEMAP_KEY_PREFIX: &str = "sitemap:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventOutcome {
    pub rules_applied: usize,
    pub entries_invalidated: usize,
    pub refresh_scheduled: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub refreshed: usize,
    pub failed: usize,
    /// Items still queued (deferred ones not yet due)
    pub remaining: usize,
}

pub struct InvalidationManager {
    cache: Arc<AuditCache>,
    validator: Arc<BatchValidator>,
    sitemaps: Arc<dyn SitemapFetcher>,
    clock: Arc<dyn Clock>,
    site_origin: Option<String>,
    rules: RwLock<RuleSet>,
    queue: Mutex<RefreshQueue>,
    log: RwLock<InvalidationLog>,
    batch_pause: Duration,
    retry_base: Duration,
}

impl InvalidationManager {
    pub fn new(
        cache: Arc<AuditCache>,
        validator: Arc<BatchValidator>,
        sitemaps: Arc<dyn SitemapFetcher>,
        clock: Arc<dyn Clock>,
        site_origin: Option<String>,
    ) -> Self {
        Self {
            cache,
            validator,
            sitemaps,
            clock,
            site_origin,
            rules: RwLock::new(RuleSet::with_defaults()),
            queue: Mutex::new(RefreshQueue::new()),
            log: RwLock::new(InvalidationLog::new()),
            batch_pause: Duration::from_millis(100),
            retry_base: Duration::from_secs(1),
        }
    }

    // == Events ==
    pub async fn process_event(&self, event: InvalidationEvent) -> EventOutcome {
        let candidates: Vec<&str> = event.candidate_urls().collect();
        let matched = self.rules.read().await.matching(&candidates);

        let mut by_namespace: BTreeMap<CacheNamespace, Vec<&CompiledRule>> = BTreeMap::new();
        for rule in &matched {
            for namespace in &rule.rule.affected_namespaces {
                by_namespace.entry(*namespace).or_default().push(rule);
            }
        }

        let mut entries_invalidated = 0;
        for (namespace, rules) in &by_namespace {
            let removed = self.invalidate_matching(*namespace, rules, &candidates).await;
            debug!(
                "{} event: {} entries removed from {} by {} rules",
                event.kind.as_str(),
                removed,
                namespace,
                rules.len()
            );
            entries_invalidated += removed;
        }

        let mut refresh_urls = Vec::with_capacity(event.affected_urls.len() + 1);
        if looks_like_url(&event.source) {
            refresh_urls.push(event.source.clone());
        }
        refresh_urls.extend(event.affected_urls.iter().cloned());
        let refresh_scheduled = if refresh_urls.is_empty() {
            0
        } else {
            self.schedule_refresh(&refresh_urls, RefreshStrategy::for_event(event.kind))
                .await
        };

        self.log.write().await.append(InvalidationRecord {
            kind: event.kind,
            source: event.source.clone(),
            occurred_at: event.occurred_at,
            rules_applied: matched.len(),
            entries_invalidated,
        });

        info!(
            "Processed {} event from '{}': {} rules applied, {} entries invalidated, {} refreshes queued",
            event.kind.as_str(),
            event.source,
            matched.len(),
            entries_invalidated,
            refresh_scheduled
        );

        EventOutcome {
            rules_applied: matched.len(),
            entries_invalidated,
            refresh_scheduled,
        }
    }

    async fn invalidate_matching(
        &self,
        namespace: CacheNamespace,
        rules: &[&CompiledRule],
        candidates: &[&str],
    ) -> usize {
        let mut removed = 0;
        for rule in rules {
            removed += self
                .cache
                .invalidate_by_pattern(&rule.pattern, Some(namespace))
                .await;

            // Entries keyed by something other than the URL itself (sitemaps by domain)
            for url in candidates.iter().filter(|url| rule.pattern.is_match(url)) {
                for key in cache_keys_for(namespace, url) {
                    if self.cache.invalidate(namespace, &key).await {
                        removed += 1;
                    }
                }
            }
        }
        removed
    }

    pub async fn invalidate_url(&self, url: &str, namespaces: Option<&[CacheNamespace]>) -> bool {
        let namespaces = namespaces.unwrap_or(&CacheNamespace::ALL[..]);
        let mut removed = false;
        for namespace in namespaces {
            for key in cache_keys_for(*namespace, url) {
                removed |= self.cache.invalidate(*namespace, &key).await;
            }
        }
        removed
    }

    /// Drops every link result under `domain` and the domain's sitemap.
    pub async fn invalidate_domain(&self, domain: &str) -> usize {
        let pattern = match Regex::new(&format!(
            r"^https?://(www\.)?{}(:\d+)?(/|\?|#|$)",
            regex::escape(domain)
        )) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("Cannot build domain pattern for {}: {}", domain, e);
                return 0;
            }
        };

        let mut removed = self
            .cache
            .invalidate_by_pattern(&pattern, Some(CacheNamespace::Links))
            .await;
        if self
            .cache
            .invalidate(CacheNamespace::Sitemap, &sitemap_key(domain))
            .await
        {
            removed += 1;
        }

        info!("Invalidated {} entries for domain {}", removed, domain);
        removed
    }

    // == Triggers ==
    pub async fn on_deployment(&self, urls: Vec<String>) -> EventOutcome {
        self.trigger(EventKind::Deployment, "deployment", urls).await
    }

    pub async fn on_content_change(&self, urls: Vec<String>) -> EventOutcome {
        self.trigger(EventKind::ContentChange, "content_change", urls).await
    }

    pub async fn on_error_recovery(&self, urls: Vec<String>) -> EventOutcome {
        self.trigger(EventKind::ErrorRecovery, "error_recovery", urls).await
    }

    /// Logs a scheduled event, queues refreshes for entries close to expiry and
    /// then sweeps what has already expired.
    pub async fn scheduled_maintenance(&self) -> EventOutcome {
        let mut outcome = self
            .trigger(EventKind::Scheduled, "scheduled_maintenance", Vec::new())
            .await;
        outcome.refresh_scheduled += self.refresh_expired().await;
        let swept = self.cache.clear_expired().await;
        info!(
            "Scheduled maintenance: {} refreshes queued, {} expired entries swept",
            outcome.refresh_scheduled, swept
        );
        outcome
    }

    async fn trigger(&self, kind: EventKind, source: &str, urls: Vec<String>) -> EventOutcome {
        let event = InvalidationEvent::new(kind, source, self.clock.now_utc()).with_urls(urls);
        self.process_event(event).await
    }

    // == Refresh ==
    /// Queues `urls` for refresh; returns how many were newly queued.
    pub async fn schedule_refresh(&self, urls: &[String], strategy: RefreshStrategy) -> usize {
        let not_before_ms = self.clock.now_ms() + strategy.delay.as_millis() as u64;
        let mut queue = self.queue.lock().await;
        urls.iter()
            .filter(|url| {
                queue.push(RefreshItem {
                    target: self.target_for(url),
                    strategy,
                    not_before_ms,
                })
            })
            .count()
    }

    /// Queues a background refresh for link and sitemap entries that are expired
    /// or within the refresh threshold of expiring.
    pub async fn refresh_expired(&self) -> usize {
        let links = self
            .cache
            .refresh_candidates(CacheNamespace::Links, REFRESH_THRESHOLD_RATIO)
            .await;
        let sitemaps = self
            .cache
            .refresh_candidates(CacheNamespace::Sitemap, REFRESH_THRESHOLD_RATIO)
            .await;

        let strategy = RefreshStrategy::BACKGROUND;
        let not_before_ms = self.clock.now_ms();
        let targets = links
            .into_iter()
            .map(|url| RefreshTarget::Link(ScannedLink::from_url(url, self.site_origin.as_deref())))
            .chain(sitemaps.into_iter().filter_map(|key| {
                key.strip_prefix(SITEMAP_KEY_PREFIX)
                    .map(|domain| RefreshTarget::Sitemap(domain.to_string()))
            }));

        let mut queue = self.queue.lock().await;
        let scheduled = targets
            .filter(|target| {
                queue.push(RefreshItem {
                    target: target.clone(),
                    strategy,
                    not_before_ms,
                })
            })
            .count();

        if scheduled > 0 {
            debug!("Queued {} near-expiry entries for refresh", scheduled);
        }
        scheduled
    }

    /// Drains every ready item in batches, pausing briefly between batches.
    pub async fn process_refresh_queue(&self) -> RefreshReport {
        let mut report = RefreshReport::default();

        loop {
            let batch = self.queue.lock().await.take_batch(self.clock.now_ms());
            if batch.is_empty() {
                break;
            }

            let outcomes = join_all(batch.iter().map(|item| self.refresh_with_retry(item))).await;
            for ok in outcomes {
                if ok {
                    report.refreshed += 1;
                } else {
                    report.failed += 1;
                }
            }

            if !self.queue.lock().await.has_ready(self.clock.now_ms()) {
                break;
            }
            tokio::time::sleep(self.batch_pause).await;
        }

        report.remaining = self.queue.lock().await.len();
        if report.refreshed + report.failed > 0 {
            info!(
                "Refresh pass: {} refreshed, {} failed, {} still queued",
                report.refreshed, report.failed, report.remaining
            );
        }
        report
    }

    pub async fn refresh_queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    async fn refresh_with_retry(&self, item: &RefreshItem) -> bool {
        let attempts = item.strategy.retry_attempts.max(1);
        for attempt in 0..attempts {
            match self.refresh_once(&item.target).await {
                Ok(()) => return true,
                Err(e) if attempt + 1 < attempts => {
                    let delay = self.retry_base * 2u32.saturating_pow(attempt);
                    debug!(
                        "Refresh of {} failed (attempt {}/{}), retrying in {:?}: {}",
                        item.target.describe(),
                        attempt + 1,
                        attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        "Refresh of {} failed permanently after {} attempts: {}",
                        item.target.describe(),
                        attempts,
                        e
                    );
                }
            }
        }
        false
    }

    async fn refresh_once(&self, target: &RefreshTarget) -> Result<()> {
        match target {
            RefreshTarget::Link(link) => {
                let results = self.validator.revalidate(std::slice::from_ref(link)).await;
                match results.first() {
                    Some(result) if result.is_transient_failure() => Err(AuditError::Probe(
                        result
                            .error_detail
                            .clone()
                            .unwrap_or_else(|| format!("{:?}", result.status)),
                    )),
                    Some(_) => Ok(()),
                    None => Err(AuditError::Internal(format!("no result for {}", link.url))),
                }
            }
            RefreshTarget::Sitemap(domain) => {
                let snapshot = self.sitemaps.fetch(domain).await?;
                self.cache.set_sitemap(domain, snapshot).await;
                Ok(())
            }
        }
    }

    fn target_for(&self, url: &str) -> RefreshTarget {
        if is_sitemap_url(url) {
            if let Some(host) = host_of(url) {
                return RefreshTarget::Sitemap(host);
            }
        }
        RefreshTarget::Link(ScannedLink::from_url(url, self.site_origin.as_deref()))
    }

    // == Rules ==
    pub async fn add_rule(&self, rule: InvalidationRule) -> Result<()> {
        let pattern = rule.url_pattern.clone();
        self.rules.write().await.add(rule)?;
        info!("Added invalidation rule {}", pattern);
        Ok(())
    }

    pub async fn remove_rule(&self, url_pattern: &str) -> bool {
        self.rules.write().await.remove(url_pattern)
    }

    pub async fn rules(&self) -> Vec<InvalidationRule> {
        self.rules.read().await.rules()
    }

    // == Stats ==
    pub async fn get_invalidation_stats(&self, days: u32) -> InvalidationStats {
        self.log.read().await.stats(days, self.clock.now_utc())
    }
}

/// Cache keys a URL maps to directly in one namespace.
fn cache_keys_for(namespace: CacheNamespace, url: &str) -> Vec<String> {
    match namespace {
        CacheNamespace::Links => vec![url.to_string()],
        CacheNamespace::Sitemap => host_of(url).map(|h| sitemap_key(&h)).into_iter().collect(),
        CacheNamespace::Reports => Vec::new(),
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

fn is_sitemap_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("sitemap") && lower.ends_with(".xml")
}

fn looks_like_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://") || source.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{CacheConfig, ValidatorConfig};
    use crate::models::{ProbeOutcome, SitemapSnapshot, ValidationResult};
    use crate::ports::{MemoryStore, Prober};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // == Test Helpers ==

    #[derive(Default)]
    struct CountingProber {
        calls: AtomicUsize,
        down: Vec<String>,
    }

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, link: &ScannedLink) -> Result<ProbeOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.contains(&link.url) {
                return Err(AuditError::Probe("connection reset".to_string()));
            }
            Ok(ProbeOutcome::valid(Some(200), 3))
        }
    }

    struct StaticSitemaps;

    #[async_trait]
    impl SitemapFetcher for StaticSitemaps {
        async fn fetch(&self, domain: &str) -> Result<SitemapSnapshot> {
            Ok(SitemapSnapshot::new(vec![format!("https://{}/", domain)], Utc::now()))
        }
    }

    struct Fixture {
        manager: InvalidationManager,
        cache: Arc<AuditCache>,
        prober: Arc<CountingProber>,
        clock: Arc<ManualClock>,
    }

    fn fixture_with(prober: CountingProber) -> Fixture {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = Arc::new(AuditCache::new(&CacheConfig::default(), clock.clone()));
        let prober = Arc::new(prober);
        let validator = Arc::new(BatchValidator::new(
            &ValidatorConfig {
                rate_limit_delay_ms: 0,
                ..ValidatorConfig::default()
            },
            cache.clone(),
            prober.clone(),
            Arc::new(MemoryStore::new()),
            clock.clone(),
        ));
        let manager = InvalidationManager::new(
            cache.clone(),
            validator,
            Arc::new(StaticSitemaps),
            clock.clone(),
            Some("https://site".to_string()),
        );
        Fixture {
            manager,
            cache,
            prober,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(CountingProber::default())
    }

    fn valid(url: &str) -> ValidationResult {
        ValidationResult::from_outcome(url, ProbeOutcome::valid(Some(200), 1), Utc::now())
    }

    // == Rule Matching ==

    #[tokio::test]
    async fn test_sitemap_event_only_touches_sitemap_namespace() {
        let f = fixture();
        f.cache.set_link(valid("https://site/sitemap.xml")).await;
        f.cache
            .set_sitemap("site", SitemapSnapshot::new(vec!["https://site/".to_string()], Utc::now()))
            .await;
        f.cache.set_report("weekly", serde_json::json!({"broken": 0})).await;

        let event = InvalidationEvent::new(EventKind::Manual, "https://site/sitemap.xml", Utc::now());
        let outcome = f.manager.process_event(event).await;

        assert_eq!(outcome.rules_applied, 1);
        assert_eq!(outcome.entries_invalidated, 1);
        assert_eq!(f.cache.keys(CacheNamespace::Sitemap).await, Vec::<String>::new());
        assert_eq!(f.cache.keys(CacheNamespace::Links).await, vec!["https://site/sitemap.xml"]);
        assert_eq!(f.cache.keys(CacheNamespace::Reports).await, vec!["weekly"]);
    }

    #[tokio::test]
    async fn test_rule_pattern_purges_matching_keys() {
        let f = fixture();
        f.cache.set_link(valid("https://site/blog/one")).await;
        f.cache.set_link(valid("https://site/blog/two")).await;
        f.cache.set_link(valid("https://site/shop")).await;

        let outcome = f
            .manager
            .on_content_change(vec!["https://site/blog/one".to_string()])
            .await;

        assert_eq!(outcome.entries_invalidated, 2);
        assert_eq!(f.cache.keys(CacheNamespace::Links).await, vec!["https://site/shop"]);
    }

    #[tokio::test]
    async fn test_unmatched_event_invalidates_nothing() {
        let f = fixture();
        f.cache.set_link(valid("https://site/about")).await;

        let event = InvalidationEvent::new(EventKind::Manual, "ops-console", Utc::now());
        let outcome = f.manager.process_event(event).await;

        assert_eq!(outcome, EventOutcome::default());
        assert_eq!(f.cache.keys(CacheNamespace::Links).await.len(), 1);
    }

    // == Direct Invalidation ==

    #[tokio::test]
    async fn test_invalidate_absent_is_idempotent() {
        let f = fixture();
        assert!(!f.manager.invalidate_url("https://site/none", None).await);
        assert_eq!(f.manager.invalidate_domain("nowhere.test").await, 0);

        f.cache.set_link(valid("https://site/a")).await;
        assert!(f.manager.invalidate_url("https://site/a", None).await);
        assert!(!f.manager.invalidate_url("https://site/a", None).await);
    }

    #[tokio::test]
    async fn test_invalidate_url_respects_namespaces() {
        let f = fixture();
        f.cache.set_link(valid("https://site/a")).await;
        assert!(
            !f.manager
                .invalidate_url("https://site/a", Some(&[CacheNamespace::Reports][..]))
                .await
        );
        assert!(
            f.manager
                .invalidate_url("https://site/a", Some(&[CacheNamespace::Links][..]))
                .await
        );
    }

    #[tokio::test]
    async fn test_invalidate_domain() {
        let f = fixture();
        f.cache.set_link(valid("https://a.test/x")).await;
        f.cache.set_link(valid("https://www.a.test/y")).await;
        f.cache.set_link(valid("https://a.test.evil/z")).await;
        f.cache.set_link(valid("https://b.test/z")).await;
        f.cache
            .set_sitemap("a.test", SitemapSnapshot::new(Vec::new(), Utc::now()))
            .await;

        assert_eq!(f.manager.invalidate_domain("a.test").await, 3);
        assert_eq!(
            f.cache.keys(CacheNamespace::Links).await,
            vec!["https://a.test.evil/z", "https://b.test/z"]
        );
    }

    // == Refresh ==

    #[tokio::test]
    async fn test_deployment_refreshes_immediately() {
        let f = fixture();
        let outcome = f.manager.on_deployment(vec!["/about".to_string()]).await;
        assert_eq!(outcome.refresh_scheduled, 1);

        let report = f.manager.process_refresh_queue().await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(report.remaining, 0);
        assert!(f.cache.get_link("/about").await.is_some());
        assert_eq!(f.prober.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_content_change_is_deferred() {
        let f = fixture();
        f.manager
            .on_content_change(vec!["/docs/intro".to_string()])
            .await;

        let early = f.manager.process_refresh_queue().await;
        assert_eq!(early.refreshed, 0);
        assert_eq!(early.remaining, 1);

        f.clock.advance_ms(RefreshStrategy::DEFERRED.delay.as_millis() as u64);
        let due = f.manager.process_refresh_queue().await;
        assert_eq!(due.refreshed, 1);
        assert_eq!(due.remaining, 0);
    }

    #[tokio::test]
    async fn test_sitemap_refresh_refetches() {
        let f = fixture();
        f.manager
            .on_deployment(vec!["https://site/sitemap.xml".to_string()])
            .await;
        f.manager.process_refresh_queue().await;

        let snapshot = f.cache.get_sitemap("site").await.unwrap();
        assert!(snapshot.contains("https://site/"));
        assert_eq!(f.prober.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_retries_with_backoff() {
        let f = fixture_with(CountingProber {
            down: vec!["https://down.test/".to_string()],
            ..CountingProber::default()
        });
        f.manager
            .on_error_recovery(vec!["https://down.test/".to_string()])
            .await;

        let started = tokio::time::Instant::now();
        let report = f.manager.process_refresh_queue().await;

        let attempts = RefreshStrategy::IMMEDIATE.retry_attempts;
        assert_eq!(report.failed, 1);
        assert_eq!(f.prober.calls.load(Ordering::SeqCst), attempts as usize);
        // 1 + 2 + 4 + 8 seconds between five attempts
        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_refresh_expired_queues_near_expiry() {
        let f = fixture();
        f.cache
            .set("https://site/soon", valid("https://site/soon"), Some(Duration::from_millis(100)))
            .await;
        f.cache.set_link(valid("https://site/fresh")).await;

        f.clock.advance_ms(95);
        assert_eq!(f.manager.refresh_expired().await, 1);
        assert_eq!(f.manager.refresh_queue_len().await, 1);
    }

    // == Rules & Stats ==

    #[tokio::test]
    async fn test_dynamic_rules() {
        let f = fixture();
        f.manager
            .add_rule(InvalidationRule::new("/shop/", [CacheNamespace::Links], "shop", 6))
            .await
            .unwrap();
        assert!(f.manager.rules().await.iter().any(|r| r.url_pattern == "/shop/"));

        f.cache.set_link(valid("https://site/shop/cart")).await;
        let outcome = f
            .manager
            .on_content_change(vec!["https://site/shop/cart".to_string()])
            .await;
        assert_eq!(outcome.entries_invalidated, 1);

        assert!(f.manager.remove_rule("/shop/").await);
        assert!(f
            .manager
            .add_rule(InvalidationRule::new("[", [CacheNamespace::Links], "bad", 1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_invalidation_stats() {
        let f = fixture();
        f.cache.set_link(valid("https://site/blog/a")).await;
        f.manager
            .on_content_change(vec!["https://site/blog/a".to_string()])
            .await;
        f.manager.on_deployment(Vec::new()).await;
        f.manager.on_deployment(Vec::new()).await;

        let stats = f.manager.get_invalidation_stats(7).await;
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.events_by_kind[&EventKind::Deployment], 2);
        assert_eq!(stats.events_by_kind[&EventKind::ContentChange], 1);
        assert_eq!(stats.total_invalidated, 1);
    }
}
