//! Audit job model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JobId = String;

/// Lowest and highest accepted job priority.
pub const MIN_JOB_PRIORITY: u8 = 1;
pub const MAX_JOB_PRIORITY: u8 = 10;

// == Job Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    FullAudit,
    QuickCheck,
    AlertAnalysis,
    WeeklyReport,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::FullAudit => "full_audit",
            JobKind::QuickCheck => "quick_check",
            JobKind::AlertAnalysis => "alert_analysis",
            JobKind::WeeklyReport => "weekly_report",
        }
    }
}

// == Job State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

// == Audit Job ==
/// One unit of scheduled audit work.
///
/// Only the scheduler changes `state`; callers create and cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditJob {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// 1 (lowest) to 10 (highest)
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AuditJob {
    pub fn new(kind: JobKind, priority: u8, scheduled_at: DateTime<Utc>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            state: JobState::Pending,
            scheduled_at,
            created_at,
            started_at: None,
            completed_at: None,
            priority,
            error: None,
            result: None,
            metadata: serde_json::Map::new(),
        }
    }
}
