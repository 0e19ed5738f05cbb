//! Audit Scheduler
//!
//! Holds pending jobs in a priority queue and runs due jobs on spawned tasks,
//! never more than `max_concurrent_audits` at once. Every call to
//! [`AuditScheduler::process_queue`] first reclaims jobs that overran their
//! timeout, then expires jobs that waited too long, then fills free slots.
//!
//! State transitions are persisted through the [`Store`]; persistence
//! failures are logged and never block scheduling.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{seconds_span, Clock};
use crate::config::SchedulerConfig;
use crate::error::{AuditError, Result};
use crate::models::{AuditJob, JobId, JobKind, JobState, MAX_JOB_PRIORITY, MIN_JOB_PRIORITY};
use crate::ports::Store;

use super::queue::JobQueue;
use super::runner::{CancelFlag, JobHandler};

/// Finished jobs kept for status queries.
pub const HISTORY_LIMIT: usize = 100;

pub const TIMEOUT_ERROR: &str = "timeout exceeded";
pub const STALE_ERROR: &str = "exceeded maximum pending age";

/// Priority used when the caller does not give one.
pub fn default_priority(kind: JobKind) -> u8 {
    match kind {
        JobKind::AlertAnalysis => 8,
        JobKind::QuickCheck => 7,
        JobKind::FullAudit => 5,
        JobKind::WeeklyReport => 3,
    }
}

// == Status Types ==
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub pending_count: usize,
    pub running_count: usize,
    pub queue: Vec<AuditJob>,
    pub running_jobs: Vec<AuditJob>,
}

/// What one pump of the queue did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpReport {
    pub reclaimed: usize,
    pub expired: usize,
    pub started: usize,
}

// == Internal State ==
struct RunningJob {
    job: AuditJob,
    cancel: CancelFlag,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SchedulerState {
    queue: JobQueue,
    running: HashMap<JobId, RunningJob>,
    history: VecDeque<AuditJob>,
}

impl SchedulerState {
    fn push_history(&mut self, job: AuditJob) {
        if self.history.len() >= HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(job);
    }
}

// == Scheduler ==
#[derive(Clone)]
pub struct AuditScheduler {
    config: SchedulerConfig,
    handler: Arc<dyn JobHandler>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<SchedulerState>>,
}

impl AuditScheduler {
    pub fn new(
        config: SchedulerConfig,
        handler: Arc<dyn JobHandler>,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            handler,
            store,
            clock,
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Queues a job, or returns the id of a pending job of the same kind
    /// scheduled within a minute of the requested time.
    pub async fn schedule_job(
        &self,
        kind: JobKind,
        priority: Option<u8>,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<JobId> {
        let priority = priority.unwrap_or_else(|| default_priority(kind));
        if !(MIN_JOB_PRIORITY..=MAX_JOB_PRIORITY).contains(&priority) {
            return Err(AuditError::InvalidRequest(format!(
                "priority must be between {} and {}",
                MIN_JOB_PRIORITY, MAX_JOB_PRIORITY
            )));
        }

        let now = self.clock.now_utc();
        let at = scheduled_at.unwrap_or(now);

        let job = {
            let mut state = self.state.lock().await;
            if let Some(existing) = state.queue.find_duplicate(kind, at) {
                debug!("Job {} already pending as {}", kind.as_str(), existing.id);
                return Ok(existing.id.clone());
            }
            let job = AuditJob::new(kind, priority, at, now);
            state.queue.insert(job.clone());
            job
        };

        info!(
            "Scheduled {} job {} (priority {}, at {})",
            kind.as_str(),
            job.id,
            priority,
            at
        );
        persist(self.store.as_ref(), &job).await;
        Ok(job.id)
    }

    /// Reclaims overrun jobs, expires stale pending jobs, then starts due jobs
    /// until every slot is taken.
    pub async fn process_queue(&self) -> PumpReport {
        let now = self.clock.now_utc();
        let audit_timeout = seconds_span(self.config.audit_timeout);
        let max_pending_age = seconds_span(self.config.max_pending_age);

        let mut report = PumpReport::default();
        let mut finished = Vec::new();
        let mut to_start = Vec::new();

        {
            let mut state = self.state.lock().await;

            let overrun: Vec<JobId> = state
                .running
                .values()
                .filter(|running| {
                    running
                        .job
                        .started_at
                        .map(|started| now - started > audit_timeout)
                        .unwrap_or(false)
                })
                .map(|running| running.job.id.clone())
                .collect();

            for id in overrun {
                let Some(mut running) = state.running.remove(&id) else {
                    continue;
                };
                running.cancel.cancel();
                if let Some(handle) = running.handle.take() {
                    handle.abort();
                }
                // A job cancelled while running stays cancelled
                if running.job.state != JobState::Cancelled {
                    running.job.state = JobState::Failed;
                    running.job.error = Some(TIMEOUT_ERROR.to_string());
                }
                running.job.completed_at = Some(now);
                warn!("Job {} ({}) reclaimed: {}", id, running.job.kind.as_str(), TIMEOUT_ERROR);
                state.push_history(running.job.clone());
                finished.push(running.job);
                report.reclaimed += 1;
            }

            for mut job in state.queue.drain_stale(now, max_pending_age) {
                job.state = JobState::Cancelled;
                job.error = Some(STALE_ERROR.to_string());
                job.completed_at = Some(now);
                warn!("Job {} ({}) cancelled: {}", job.id, job.kind.as_str(), STALE_ERROR);
                state.push_history(job.clone());
                finished.push(job);
                report.expired += 1;
            }

            while state.running.len() < self.config.max_concurrent_audits {
                let Some(mut job) = state.queue.pop_due(now) else {
                    break;
                };
                job.state = JobState::Running;
                job.started_at = Some(now);
                let cancel = CancelFlag::default();
                state.running.insert(
                    job.id.clone(),
                    RunningJob {
                        job: job.clone(),
                        cancel: cancel.clone(),
                        handle: None,
                    },
                );
                to_start.push((job, cancel));
            }
        }

        for job in &finished {
            persist(self.store.as_ref(), job).await;
        }

        for (job, cancel) in to_start {
            info!("Starting {} job {}", job.kind.as_str(), job.id);
            persist(self.store.as_ref(), &job).await;
            let id = job.id.clone();
            let handle = self.spawn_job(job, cancel);
            let mut state = self.state.lock().await;
            // The job may already have finished and left the running set
            if let Some(running) = state.running.get_mut(&id) {
                running.handle = Some(handle);
            }
            report.started += 1;
        }

        report
    }

    fn spawn_job(&self, job: AuditJob, cancel: CancelFlag) -> JoinHandle<()> {
        let handler = Arc::clone(&self.handler);
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let state = Arc::clone(&self.state);
        let limit = Duration::from_secs(self.config.audit_timeout);

        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(limit, handler.run(&job, cancel)).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(TIMEOUT_ERROR.to_string()),
            };

            let finished = {
                let mut state = state.lock().await;
                // Reclaimed by the timeout sweep
                let Some(running) = state.running.remove(&job.id) else {
                    return;
                };
                let mut job = running.job;
                job.completed_at = Some(clock.now_utc());
                match outcome {
                    _ if job.state == JobState::Cancelled => {}
                    Ok(value) => {
                        job.state = JobState::Completed;
                        job.result = Some(value);
                    }
                    Err(error) => {
                        job.state = JobState::Failed;
                        job.error = Some(error);
                    }
                }
                state.push_history(job.clone());
                job
            };

            match finished.state {
                JobState::Failed => warn!(
                    "Job {} ({}) failed: {}",
                    finished.id,
                    finished.kind.as_str(),
                    finished.error.as_deref().unwrap_or("unknown error")
                ),
                state => info!("Job {} ({}) {:?}", finished.id, finished.kind.as_str(), state),
            }
            persist(store.as_ref(), &finished).await;
        })
    }

    /// Cancels a pending or running job. A running job is marked cancelled and
    /// its cancel flag set; the handler itself is left to finish.
    ///
    /// Returns false for unknown or already finished jobs.
    pub async fn cancel_job(&self, id: &str) -> bool {
        let now = self.clock.now_utc();
        let cancelled = {
            let mut state = self.state.lock().await;
            if let Some(mut job) = state.queue.remove(id) {
                job.state = JobState::Cancelled;
                job.completed_at = Some(now);
                state.push_history(job.clone());
                job
            } else if let Some(running) = state.running.get_mut(id) {
                if running.job.state == JobState::Cancelled {
                    return false;
                }
                running.cancel.cancel();
                running.job.state = JobState::Cancelled;
                running.job.clone()
            } else {
                return false;
            }
        };

        info!("Cancelled {} job {}", cancelled.kind.as_str(), cancelled.id);
        persist(self.store.as_ref(), &cancelled).await;
        true
    }

    pub async fn get_queue_status(&self) -> QueueStatus {
        let state = self.state.lock().await;
        let mut running_jobs: Vec<AuditJob> =
            state.running.values().map(|running| running.job.clone()).collect();
        running_jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at));

        QueueStatus {
            pending_count: state.queue.len(),
            running_count: running_jobs.len(),
            queue: state.queue.jobs().to_vec(),
            running_jobs,
        }
    }

    pub async fn get_job(&self, id: &str) -> Option<AuditJob> {
        let state = self.state.lock().await;
        state
            .queue
            .get(id)
            .or_else(|| state.running.get(id).map(|running| &running.job))
            .or_else(|| state.history.iter().rev().find(|job| job.id == id))
            .cloned()
    }

    /// Finished jobs, oldest first.
    pub async fn history(&self) -> Vec<AuditJob> {
        self.state.lock().await.history.iter().cloned().collect()
    }
}

async fn persist(store: &dyn Store, job: &AuditJob) {
    if let Err(e) = store.record_job(job).await {
        warn!("Failed to persist job {}: {}", job.id, e);
    }
}
