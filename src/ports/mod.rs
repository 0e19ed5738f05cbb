//! Collaborator interfaces
//!
//! Capabilities the audit pipeline depends on but does not own: probing a single
//! link, durable storage, link discovery, sitemap fetching and report delivery.

mod link_source;
mod memory_store;
mod reporter;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AuditJob, AuditMetrics, ProbeOutcome, ScannedLink, SitemapSnapshot, ValidationResult,
};

pub use link_source::{FileLinkSource, StaticLinkSource};
pub use memory_store::{MemoryStore, MAX_STORED_JOBS};
pub use reporter::LogReporter;

/// Checks one link.
///
/// Implementations own their retry policy; an `Err` means retries are exhausted.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, link: &ScannedLink) -> Result<ProbeOutcome>;
}

/// Durable record of results and jobs. Never consulted for freshness decisions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_result(&self, link: &ScannedLink, result: &ValidationResult) -> Result<()>;

    async fn record_job(&self, job: &AuditJob) -> Result<()>;

    /// Links whose latest result is broken or timed out.
    async fn broken_links(&self) -> Result<Vec<ScannedLink>>;

    async fn latest_metrics(&self) -> Result<AuditMetrics>;
}

/// Supplies the links a full audit checks.
#[async_trait]
pub trait LinkSource: Send + Sync {
    async fn discover(&self) -> Result<Vec<ScannedLink>>;
}

/// Fetches a domain's sitemap.
#[async_trait]
pub trait SitemapFetcher: Send + Sync {
    async fn fetch(&self, domain: &str) -> Result<SitemapSnapshot>;
}

/// Produces alert analyses and weekly reports.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn analyze_alerts(
        &self,
        metrics: &AuditMetrics,
        broken: &[ScannedLink],
    ) -> Result<serde_json::Value>;

    async fn weekly_report(&self, metrics: &AuditMetrics) -> Result<serde_json::Value>;
}
