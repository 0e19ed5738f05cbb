//! Request DTOs for the trigger API
//!
//! Defines the structure of incoming HTTP request bodies.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cache::CacheNamespace;
use crate::invalidation::MAX_STATS_DAYS;
use crate::models::{EventKind, JobKind, ScannedLink, MAX_JOB_PRIORITY, MIN_JOB_PRIORITY};

/// Most links accepted by one `POST /validate` call.
pub const MAX_VALIDATE_LINKS: usize = 1000;

/// Request body for `POST /jobs`
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleJobRequest {
    pub kind: JobKind,
    /// 1-10, defaults per kind
    #[serde(default)]
    pub priority: Option<u8>,
    /// Run no earlier than this; now if absent
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl ScheduleJobRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match self.priority {
            Some(p) if !(MIN_JOB_PRIORITY..=MAX_JOB_PRIORITY).contains(&p) => Some(format!(
                "Priority must be between {} and {}",
                MIN_JOB_PRIORITY, MAX_JOB_PRIORITY
            )),
            _ => None,
        }
    }
}

/// Request body for `POST /invalidation/events`
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidationEventRequest {
    pub kind: EventKind,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Request body for `POST /invalidation/rules`
#[derive(Debug, Clone, Deserialize)]
pub struct AddRuleRequest {
    pub url_pattern: String,
    pub namespaces: Vec<CacheNamespace>,
    pub reason: String,
    #[serde(default = "default_rule_priority")]
    pub priority: u8,
}

fn default_rule_priority() -> u8 {
    5
}

impl AddRuleRequest {
    pub fn validate(&self) -> Option<String> {
        if self.url_pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.namespaces.is_empty() {
            return Some("At least one namespace is required".to_string());
        }
        None
    }
}

/// Query string for `GET /invalidation/stats`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    /// Look-back window; 7 days if absent, capped at [`MAX_STATS_DAYS`]
    #[serde(default)]
    pub days: Option<u32>,
}

impl StatsQuery {
    pub const DEFAULT_DAYS: u32 = 7;

    pub fn days(&self) -> u32 {
        self.days.unwrap_or(Self::DEFAULT_DAYS).min(MAX_STATS_DAYS)
    }
}

/// Request body for `POST /validate`
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateRequest {
    pub links: Vec<ScannedLink>,
}

impl ValidateRequest {
    pub fn validate(&self) -> Option<String> {
        if self.links.is_empty() {
            return Some("No links supplied".to_string());
        }
        if self.links.len() > MAX_VALIDATE_LINKS {
            return Some(format!(
                "At most {} links per request",
                MAX_VALIDATE_LINKS
            ));
        }
        None
    }
}
