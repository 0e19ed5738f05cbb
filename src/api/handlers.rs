//! API Handlers
//!
//! HTTP request handlers for the trigger and status endpoints. Each handler is
//! a thin adapter over one [`AppContext`] component.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::context::AppContext;
use crate::error::{AuditError, Result};
use crate::invalidation::InvalidationStats;
use crate::models::{
    AddRuleRequest, AuditJob, CacheStatsResponse, CancelResponse, EventResponse, HealthResponse,
    InvalidationEvent, InvalidationEventRequest, InvalidationRule, ScheduleJobRequest,
    ScheduleJobResponse, StatsQuery, ValidateRequest, ValidationResult,
};
use crate::scheduler::QueueStatus;
use crate::validator::ValidationStats;

// == Health & Cache ==
/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /cache/stats
pub async fn cache_stats_handler(State(ctx): State<AppContext>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse::new(ctx.cache.stats().await))
}

// == Jobs ==
/// Handler for POST /jobs
///
/// Returns the id of an equivalent pending job when the request is a duplicate.
pub async fn schedule_job_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<ScheduleJobRequest>,
) -> Result<Json<ScheduleJobResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(AuditError::InvalidRequest(error_msg));
    }

    let job_id = ctx
        .scheduler
        .schedule_job(req.kind, req.priority, req.scheduled_at)
        .await?;
    Ok(Json(ScheduleJobResponse::new(job_id)))
}

/// Handler for GET /jobs
pub async fn queue_status_handler(State(ctx): State<AppContext>) -> Json<QueueStatus> {
    Json(ctx.scheduler.get_queue_status().await)
}

/// Handler for GET /jobs/:id
pub async fn get_job_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<AuditJob>> {
    ctx.scheduler
        .get_job(&id)
        .await
        .map(Json)
        .ok_or_else(|| AuditError::NotFound(format!("job '{}'", id)))
}

/// Handler for DELETE /jobs/:id
///
/// Unknown ids are 404; finished jobs answer `cancelled: false`.
pub async fn cancel_job_handler(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>> {
    if ctx.scheduler.get_job(&id).await.is_none() {
        return Err(AuditError::NotFound(format!("job '{}'", id)));
    }
    let cancelled = ctx.scheduler.cancel_job(&id).await;
    Ok(Json(CancelResponse {
        job_id: id,
        cancelled,
    }))
}

// == Invalidation ==
/// Handler for POST /invalidation/events
pub async fn invalidation_event_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<InvalidationEventRequest>,
) -> Json<EventResponse> {
    let source = req
        .source
        .unwrap_or_else(|| req.kind.as_str().to_string());
    let event = InvalidationEvent::new(req.kind, source, ctx.clock.now_utc()).with_urls(req.urls);
    let outcome = ctx.invalidation.process_event(event).await;

    Json(EventResponse {
        kind: req.kind,
        rules_applied: outcome.rules_applied,
        entries_invalidated: outcome.entries_invalidated,
        refresh_scheduled: outcome.refresh_scheduled,
    })
}

/// Handler for GET /invalidation/stats?days=N
pub async fn invalidation_stats_handler(
    State(ctx): State<AppContext>,
    Query(query): Query<StatsQuery>,
) -> Json<InvalidationStats> {
    Json(ctx.invalidation.get_invalidation_stats(query.days()).await)
}

/// Handler for GET /invalidation/rules
pub async fn list_rules_handler(State(ctx): State<AppContext>) -> Json<Vec<InvalidationRule>> {
    Json(ctx.invalidation.rules().await)
}

/// Handler for POST /invalidation/rules
pub async fn add_rule_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<AddRuleRequest>,
) -> Result<Json<InvalidationRule>> {
    if let Some(error_msg) = req.validate() {
        return Err(AuditError::InvalidRequest(error_msg));
    }

    let rule = InvalidationRule::new(req.url_pattern, req.namespaces, req.reason, req.priority);
    ctx.invalidation.add_rule(rule.clone()).await?;
    Ok(Json(rule))
}

// == Validation ==
/// Handler for POST /validate
///
/// Validates with priority ordering; results come back critical/high first.
pub async fn validate_handler(
    State(ctx): State<AppContext>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<Vec<ValidationResult>>> {
    if let Some(error_msg) = req.validate() {
        return Err(AuditError::InvalidRequest(error_msg));
    }
    Ok(Json(ctx.validator.validate_with_priority(&req.links).await))
}

/// Handler for GET /validator/stats
pub async fn validator_stats_handler(State(ctx): State<AppContext>) -> Json<ValidationStats> {
    Json(ctx.validator.stats().await)
}
