//! Scheduler Module
//!
//! Priority job queue with deduplication, bounded concurrency, timeout
//! reclamation and recurring triggers.

mod queue;
mod recurring;
mod runner;
#[allow(clippy::module_inception)]
mod scheduler;

pub use queue::{JobQueue, DEDUP_WINDOW_SECS};
pub use recurring::RecurringPlan;
pub use runner::{
    AuditJobRunner, CancelFlag, JobHandler, ALERT_REPORT_KEY, FULL_AUDIT_REPORT_KEY,
    QUICK_CHECK_REPORT_KEY,
};
pub use scheduler::{
    default_priority, AuditScheduler, PumpReport, QueueStatus, HISTORY_LIMIT, STALE_ERROR,
    TIMEOUT_ERROR,
};
