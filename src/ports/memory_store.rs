//! In-process store
//!
//! Keeps the latest result per URL and the latest record of the most recent
//! [`MAX_STORED_JOBS`] jobs. Used by the binary when no external database is
//! wired in, and by tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{AuditJob, AuditMetrics, LinkStatus, ScannedLink, ValidationResult};
use crate::ports::Store;

/// Job records beyond this many are dropped, oldest first.
pub const MAX_STORED_JOBS: usize = 1000;

#[derive(Debug, Default)]
struct JobRecords {
    by_id: HashMap<String, AuditJob>,
    /// Ids in first-recorded order
    order: VecDeque<String>,
}

impl JobRecords {
    fn record(&mut self, job: &AuditJob) {
        if self.by_id.insert(job.id.clone(), job.clone()).is_some() {
            return;
        }
        self.order.push_back(job.id.clone());
        while self.order.len() > MAX_STORED_JOBS {
            if let Some(oldest) = self.order.pop_front() {
                self.by_id.remove(&oldest);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    results: RwLock<HashMap<String, (ScannedLink, ValidationResult)>>,
    jobs: RwLock<JobRecords>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn result_count(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn job(&self, id: &str) -> Option<AuditJob> {
        self.jobs.read().await.by_id.get(id).cloned()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.by_id.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_result(&self, link: &ScannedLink, result: &ValidationResult) -> Result<()> {
        self.results
            .write()
            .await
            .insert(result.url.clone(), (link.clone(), result.clone()));
        Ok(())
    }

    async fn record_job(&self, job: &AuditJob) -> Result<()> {
        self.jobs.write().await.record(job);
        Ok(())
    }

    async fn broken_links(&self) -> Result<Vec<ScannedLink>> {
        let results = self.results.read().await;
        let mut broken: Vec<ScannedLink> = results
            .values()
            .filter(|(_, result)| matches!(result.status, LinkStatus::Broken | LinkStatus::Timeout))
            .map(|(link, _)| link.clone())
            .collect();
        broken.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(broken)
    }

    async fn latest_metrics(&self) -> Result<AuditMetrics> {
        let results = self.results.read().await;
        Ok(AuditMetrics::from_results(results.values().map(|(_, r)| r)))
    }
}
