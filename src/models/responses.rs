//! Response DTOs for the trigger and status API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::models::{EventKind, JobId};

/// Response body for `GET /cache/stats`
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// hits / (hits + misses)
    pub hit_rate: f64,
    /// misses / (hits + misses)
    pub miss_rate: f64,
    /// estimated_memory_bytes / max_memory_bytes
    pub memory_utilization: f64,
}

impl CacheStatsResponse {
    pub fn new(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            miss_rate: stats.miss_rate(),
            memory_utilization: stats.memory_utilization(),
            stats,
        }
    }
}

/// Response body for `POST /jobs`
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleJobResponse {
    pub job_id: JobId,
    pub message: String,
}

impl ScheduleJobResponse {
    pub fn new(job_id: JobId) -> Self {
        Self {
            message: format!("Job '{}' scheduled", job_id),
            job_id,
        }
    }
}

/// Response body for `DELETE /jobs/:id`
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

/// Response body for `POST /invalidation/events`
#[derive(Debug, Clone, Serialize)]
pub struct EventResponse {
    pub kind: EventKind,
    pub rules_applied: usize,
    pub entries_invalidated: usize,
    pub refresh_scheduled: usize,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
