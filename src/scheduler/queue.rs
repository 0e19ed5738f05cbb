//! Pending job queue
//!
//! Kept sorted by descending priority; equal priorities keep submission order.

use chrono::{DateTime, Duration, Utc};

use crate::models::{AuditJob, JobKind};

/// Jobs of the same kind scheduled this close together are duplicates.
pub const DEDUP_WINDOW_SECS: i64 = 60;

#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Vec<AuditJob>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pending job of `kind` scheduled within the dedup window of `at`.
    pub fn find_duplicate(&self, kind: JobKind, at: DateTime<Utc>) -> Option<&AuditJob> {
        let window = Duration::seconds(DEDUP_WINDOW_SECS);
        self.jobs
            .iter()
            .find(|job| job.kind == kind && (job.scheduled_at - at).abs() <= window)
    }

    pub fn insert(&mut self, job: AuditJob) {
        let at = self.jobs.partition_point(|queued| queued.priority >= job.priority);
        self.jobs.insert(at, job);
    }

    /// Removes the highest-priority job that is due at `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<AuditJob> {
        let pos = self.jobs.iter().position(|job| job.scheduled_at <= now)?;
        Some(self.jobs.remove(pos))
    }

    pub fn remove(&mut self, id: &str) -> Option<AuditJob> {
        let pos = self.jobs.iter().position(|job| job.id == id)?;
        Some(self.jobs.remove(pos))
    }

    /// Removes jobs that have waited more than `max_age` past their scheduled time.
    pub fn drain_stale(&mut self, now: DateTime<Utc>, max_age: Duration) -> Vec<AuditJob> {
        let (stale, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|job| now - job.scheduled_at > max_age);
        self.jobs = keep;
        stale
    }

    pub fn get(&self, id: &str) -> Option<&AuditJob> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn jobs(&self) -> &[AuditJob] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(kind: JobKind, priority: u8, at: DateTime<Utc>) -> AuditJob {
        AuditJob::new(kind, priority, at, at)
    }

    #[test]
    fn test_insert_orders_by_priority_then_submission() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        let a = job(JobKind::QuickCheck, 5, now);
        let b = job(JobKind::FullAudit, 9, now);
        let c = job(JobKind::AlertAnalysis, 5, now);
        let ids = [a.id.clone(), b.id.clone(), c.id.clone()];
        queue.insert(a);
        queue.insert(b);
        queue.insert(c);

        let order: Vec<_> = queue.jobs().iter().map(|j| j.id.clone()).collect();
        assert_eq!(order, vec![ids[1].clone(), ids[0].clone(), ids[2].clone()]);
    }

    #[test]
    fn test_find_duplicate_window() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        queue.insert(job(JobKind::FullAudit, 5, now));

        assert!(queue.find_duplicate(JobKind::FullAudit, now + Duration::seconds(10)).is_some());
        assert!(queue.find_duplicate(JobKind::FullAudit, now - Duration::seconds(60)).is_some());
        assert!(queue.find_duplicate(JobKind::FullAudit, now + Duration::seconds(61)).is_none());
        assert!(queue.find_duplicate(JobKind::QuickCheck, now).is_none());
    }

    #[test]
    fn test_pop_due_skips_future_jobs() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        queue.insert(job(JobKind::FullAudit, 9, now + Duration::hours(1)));
        queue.insert(job(JobKind::QuickCheck, 2, now));

        let popped = queue.pop_due(now).unwrap();
        assert_eq!(popped.kind, JobKind::QuickCheck);
        assert!(queue.pop_due(now).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_stale() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        queue.insert(job(JobKind::FullAudit, 5, now - Duration::hours(25)));
        queue.insert(job(JobKind::QuickCheck, 5, now - Duration::hours(1)));

        let stale = queue.drain_stale(now, Duration::hours(24));
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].kind, JobKind::FullAudit);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove() {
        let now = Utc::now();
        let mut queue = JobQueue::new();
        let j = job(JobKind::WeeklyReport, 3, now);
        let id = j.id.clone();
        queue.insert(j);
        assert!(queue.get(&id).is_some());
        assert!(queue.remove(&id).is_some());
        assert!(queue.remove(&id).is_none());
        assert!(queue.is_empty());
    }
}
