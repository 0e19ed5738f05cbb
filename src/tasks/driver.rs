//! Maintenance driver
//!
//! Background loops of the process. The driver tick queues recurring jobs
//! that became due, pumps the scheduler, sweeps the cache on the cleanup
//! interval and keeps memory under budget. Refreshes drain on a separate
//! worker because their retry backoff can run for minutes.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::utc_to_ms;
use crate::context::AppContext;
use crate::scheduler::{PumpReport, RecurringPlan};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub jobs_triggered: usize,
    pub pump: PumpReport,
    pub swept: bool,
    pub evicted: usize,
}

pub struct MaintenanceDriver {
    ctx: AppContext,
    plan: RecurringPlan,
    last_sweep_ms: u64,
}

impl MaintenanceDriver {
    pub fn new(ctx: AppContext) -> Self {
        let now = ctx.clock.now_utc();
        Self {
            plan: RecurringPlan::new(&ctx.config.scheduler, now),
            last_sweep_ms: utc_to_ms(now),
            ctx,
        }
    }

    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let now = self.ctx.clock.now_utc();

        for kind in self.plan.due(now) {
            match self.ctx.scheduler.schedule_job(kind, None, None).await {
                Ok(id) => {
                    debug!("Recurring {} job queued as {}", kind.as_str(), id);
                    report.jobs_triggered += 1;
                }
                Err(e) => warn!("Failed to queue recurring {} job: {}", kind.as_str(), e),
            }
        }

        report.pump = self.ctx.scheduler.process_queue().await;

        let now_ms = utc_to_ms(now);
        let sweep_every_ms = self.ctx.config.cache.cleanup_interval.saturating_mul(1000);
        if now_ms.saturating_sub(self.last_sweep_ms) >= sweep_every_ms {
            self.ctx.invalidation.scheduled_maintenance().await;
            self.last_sweep_ms = now_ms;
            report.swept = true;
        }

        report.evicted = self.ctx.cache.enforce_memory_budget().await;

        report
    }
}

/// Handles of the spawned background loops.
pub struct MaintenanceTasks {
    pub driver: JoinHandle<()>,
    pub refresher: JoinHandle<()>,
}

impl MaintenanceTasks {
    pub fn abort(&self) {
        self.driver.abort();
        self.refresher.abort();
    }
}

/// Spawns the driver loop and the refresh worker, both on
/// `queue_pump_interval`. Abort the returned tasks on shutdown.
pub fn spawn_maintenance_driver(ctx: AppContext) -> MaintenanceTasks {
    let interval = Duration::from_secs(ctx.config.scheduler.queue_pump_interval);
    let refresher = spawn_refresh_worker(ctx.clone());

    let driver = tokio::spawn(async move {
        info!(
            "Starting maintenance driver with interval of {} seconds",
            interval.as_secs()
        );
        let mut driver = MaintenanceDriver::new(ctx);

        loop {
            tokio::time::sleep(interval).await;
            let report = driver.tick().await;
            debug!("Maintenance tick: {:?}", report);
        }
    });

    MaintenanceTasks { driver, refresher }
}

/// Drains ready refreshes every `queue_pump_interval` seconds.
pub fn spawn_refresh_worker(ctx: AppContext) -> JoinHandle<()> {
    let interval = Duration::from_secs(ctx.config.scheduler.queue_pump_interval);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let report = ctx.invalidation.process_refresh_queue().await;
            debug!("Refresh pass: {:?}", report);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::context::Collaborators;
    use crate::error::{AuditError, Result};
    use crate::models::{JobState, ProbeOutcome, ScannedLink, SitemapSnapshot};
    use crate::ports::{LogReporter, MemoryStore, Prober, SitemapFetcher, StaticLinkSource};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    const START_MS: u64 = 1_700_000_000_000;

    /// Errors on anything under `/flaky/`, fine otherwise.
    struct OkProber;

    #[async_trait]
    impl Prober for OkProber {
        async fn probe(&self, link: &ScannedLink) -> Result<ProbeOutcome> {
            if link.url.starts_with("/flaky/") {
                return Err(AuditError::Probe("connection reset".to_string()));
            }
            Ok(ProbeOutcome::valid(Some(200), 1))
        }
    }

    struct EmptySitemaps;

    #[async_trait]
    impl SitemapFetcher for EmptySitemaps {
        async fn fetch(&self, _domain: &str) -> Result<SitemapSnapshot> {
            Ok(SitemapSnapshot::new(Vec::new(), chrono::Utc::now()))
        }
    }

    fn context(config: Config) -> (AppContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START_MS));
        let collaborators = Collaborators {
            prober: Arc::new(OkProber),
            store: Arc::new(MemoryStore::new()),
            links: Arc::new(StaticLinkSource::default()),
            sitemaps: Arc::new(EmptySitemaps),
            reporter: Arc::new(LogReporter),
        };
        (AppContext::new(config, clock.clone(), collaborators), clock)
    }

    #[tokio::test]
    async fn test_tick_starts_queued_jobs() {
        let (ctx, _) = context(Config::default());
        let id = ctx
            .scheduler
            .schedule_job(crate::models::JobKind::AlertAnalysis, None, None)
            .await
            .unwrap();

        let mut driver = MaintenanceDriver::new(ctx.clone());
        let report = driver.tick().await;
        assert_eq!(report.pump.started, 1);
        assert!(!report.swept);

        for _ in 0..400 {
            if ctx.scheduler.get_job(&id).await.unwrap().state == JobState::Completed {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("alert analysis did not complete");
    }

    #[tokio::test]
    async fn test_sweep_runs_on_cleanup_interval() {
        let mut config = Config::default();
        config.scheduler.quick_check_interval = 30 * 24 * 60 * 60;
        config.scheduler.alert_analysis_interval = 30 * 24 * 60 * 60;
        let (ctx, clock) = context(config);
        ctx.cache
            .set("old", json!(1), Some(Duration::from_millis(10)))
            .await;

        let mut driver = MaintenanceDriver::new(ctx.clone());
        clock.advance_ms(1_000);
        assert!(!driver.tick().await.swept);
        assert_eq!(ctx.cache.stats().await.total_entries, 1);

        clock.advance_ms(ctx.config.cache.cleanup_interval * 1000);
        assert!(driver.tick().await.swept);
        assert_eq!(ctx.cache.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_interval_triggers_queue_jobs() {
        let (ctx, clock) = context(Config::default());
        let mut driver = MaintenanceDriver::new(ctx.clone());

        clock.advance_ms(ctx.config.scheduler.alert_analysis_interval * 1000);
        let report = driver.tick().await;
        assert_eq!(report.jobs_triggered, 1);
        assert_eq!(report.pump.started, 1);

        // Nothing new is due right after
        assert_eq!(driver.tick().await.jobs_triggered, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_backlog_does_not_hold_up_jobs() {
        let (ctx, _) = context(Config::default());
        let urls: Vec<String> = (0..30).map(|i| format!("/flaky/{}", i)).collect();
        assert_eq!(ctx.invalidation.on_deployment(urls).await.refresh_scheduled, 30);

        let pump = Duration::from_secs(ctx.config.scheduler.queue_pump_interval);
        let refresher = spawn_refresh_worker(ctx.clone());
        // Worker is now mid-backoff on its first batch
        tokio::time::sleep(pump + Duration::from_secs(1)).await;

        let id = ctx
            .scheduler
            .schedule_job(crate::models::JobKind::AlertAnalysis, None, None)
            .await
            .unwrap();
        let mut driver = MaintenanceDriver::new(ctx.clone());
        let before = tokio::time::Instant::now();
        let report = driver.tick().await;

        assert_eq!(report.pump.started, 1);
        assert!(before.elapsed() < Duration::from_secs(1));
        assert_ne!(ctx.scheduler.get_job(&id).await.unwrap().state, JobState::Pending);
        assert!(ctx.invalidation.refresh_queue_len().await > 0);
        refresher.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_worker_drains_queue() {
        let (ctx, _) = context(Config::default());
        ctx.invalidation
            .on_deployment(vec!["/docs/intro".to_string()])
            .await;
        assert_eq!(ctx.invalidation.refresh_queue_len().await, 1);

        let refresher = spawn_refresh_worker(ctx.clone());
        let pump = Duration::from_secs(ctx.config.scheduler.queue_pump_interval);
        tokio::time::sleep(pump + Duration::from_secs(1)).await;

        assert_eq!(ctx.invalidation.refresh_queue_len().await, 0);
        assert!(ctx.cache.get_link("/docs/intro").await.is_some());
        refresher.abort();
    }
}
