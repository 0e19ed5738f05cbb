//! Job handlers
//!
//! [`AuditJobRunner`] dispatches each job kind to the pipeline piece that does
//! the work: full audits and quick checks go through the batch validator,
//! alert analysis and weekly reports through the reporter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::cache::AuditCache;
use crate::error::{AuditError, Result};
use crate::models::{AuditJob, AuditMetrics, JobKind};
use crate::ports::{LinkSource, Reporter, Store};
use crate::validator::BatchValidator;

pub const FULL_AUDIT_REPORT_KEY: &str = "full_audit:latest";
pub const QUICK_CHECK_REPORT_KEY: &str = "quick_check:latest";
pub const ALERT_REPORT_KEY: &str = "alerts:latest";

// == Cancel Flag ==
/// Set when a running job is cancelled. Handlers poll it at convenient points.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err` once cancelled, for use with `?`.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AuditError::Internal("job cancelled".to_string()))
        } else {
            Ok(())
        }
    }
}

// == Handler Trait ==
/// Executes one job. The returned value is stored as the job's result.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: &AuditJob, cancel: CancelFlag) -> Result<Value>;
}

// == Default Runner ==
pub struct AuditJobRunner {
    validator: Arc<BatchValidator>,
    cache: Arc<AuditCache>,
    store: Arc<dyn Store>,
    links: Arc<dyn LinkSource>,
    reporter: Arc<dyn Reporter>,
}

impl AuditJobRunner {
    pub fn new(
        validator: Arc<BatchValidator>,
        cache: Arc<AuditCache>,
        store: Arc<dyn Store>,
        links: Arc<dyn LinkSource>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            validator,
            cache,
            store,
            links,
            reporter,
        }
    }

    async fn full_audit(&self, cancel: &CancelFlag) -> Result<Value> {
        let links = self.links.discover().await?;
        cancel.check()?;

        let results = self.validator.validate_with_priority(&links).await;
        let metrics = AuditMetrics::from_results(&results);
        info!(
            "Full audit: {} links, {} broken, {} timeouts",
            metrics.total_links, metrics.broken, metrics.timeouts
        );

        let report = json!({ "links_checked": links.len(), "metrics": metrics });
        self.cache.set_report(FULL_AUDIT_REPORT_KEY, report.clone()).await;
        Ok(report)
    }

    /// Re-probes previously broken links, bypassing cached results.
    async fn quick_check(&self, cancel: &CancelFlag) -> Result<Value> {
        let broken = self.store.broken_links().await?;
        cancel.check()?;

        let results = self.validator.revalidate(&broken).await;
        let recovered = results.iter().filter(|r| r.is_ok()).count();
        info!(
            "Quick check: {} previously broken links, {} recovered",
            broken.len(),
            recovered
        );

        let report = json!({
            "checked": broken.len(),
            "recovered": recovered,
            "still_broken": broken.len() - recovered,
        });
        self.cache.set_report(QUICK_CHECK_REPORT_KEY, report.clone()).await;
        Ok(report)
    }

    async fn alert_analysis(&self) -> Result<Value> {
        let metrics = self.store.latest_metrics().await?;
        let broken = self.store.broken_links().await?;
        let analysis = self.reporter.analyze_alerts(&metrics, &broken).await?;
        self.cache.set_report(ALERT_REPORT_KEY, analysis.clone()).await;
        Ok(analysis)
    }

    async fn weekly_report(&self, job: &AuditJob) -> Result<Value> {
        let metrics = self.store.latest_metrics().await?;
        let report = self.reporter.weekly_report(&metrics).await?;
        let key = format!("weekly:{}", job.scheduled_at.format("%G-W%V"));
        self.cache.set_report(key, report.clone()).await;
        Ok(report)
    }
}

#[async_trait]
impl JobHandler for AuditJobRunner {
    async fn run(&self, job: &AuditJob, cancel: CancelFlag) -> Result<Value> {
        match job.kind {
            JobKind::FullAudit => self.full_audit(&cancel).await,
            JobKind::QuickCheck => self.quick_check(&cancel).await,
            JobKind::AlertAnalysis => self.alert_analysis().await,
            JobKind::WeeklyReport => self.weekly_report(job).await,
        }
    }
}
