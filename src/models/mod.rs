//! Domain models and API DTOs
//!
//! Domain types flow between the cache, validator, invalidation manager and
//! scheduler; `requests`/`responses` define the HTTP request and response bodies.

pub mod invalidation;
pub mod job;
pub mod link;
pub mod metrics;
pub mod requests;
pub mod responses;
pub mod sitemap;
pub mod validation;

// Re-export commonly used types
pub use invalidation::{EventKind, InvalidationEvent, InvalidationRule};
pub use job::{AuditJob, JobId, JobKind, JobState, MAX_JOB_PRIORITY, MIN_JOB_PRIORITY};
pub use link::{LinkKind, LinkPriority, ScannedLink};
pub use metrics::AuditMetrics;
pub use requests::{
    AddRuleRequest, InvalidationEventRequest, ScheduleJobRequest, StatsQuery, ValidateRequest,
    MAX_VALIDATE_LINKS,
};
pub use responses::{
    CacheStatsResponse, CancelResponse, EventResponse, HealthResponse, ScheduleJobResponse,
};
pub use sitemap::{sitemap_key, SitemapSnapshot};
pub use validation::{LinkStatus, ProbeOutcome, ValidationResult};
