//! Validation result model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// == Link Status ==
/// Health classification of a checked link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Valid,
    Broken,
    Redirect,
    Timeout,
    Unknown,
}

// == Probe Outcome ==
/// What a prober reports for one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub latency_ms: u64,
}

impl ProbeOutcome {
    pub fn valid(status_code: Option<u16>, latency_ms: u64) -> Self {
        Self {
            status: LinkStatus::Valid,
            status_code,
            redirect_target: None,
            error_detail: None,
            latency_ms,
        }
    }

    pub fn broken(status_code: Option<u16>, detail: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            status: LinkStatus::Broken,
            status_code,
            redirect_target: None,
            error_detail: Some(detail.into()),
            latency_ms,
        }
    }

    pub fn redirect(status_code: u16, target: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            status: LinkStatus::Redirect,
            status_code: Some(status_code),
            redirect_target: Some(target.into()),
            error_detail: None,
            latency_ms,
        }
    }

    pub fn timeout(latency_ms: u64) -> Self {
        Self {
            status: LinkStatus::Timeout,
            status_code: None,
            redirect_target: None,
            error_detail: Some("request timed out".to_string()),
            latency_ms,
        }
    }
}

// == Validation Result ==
/// Outcome of checking one URL at a point in time.
///
/// Never mutated once built; a newer check replaces the cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub url: String,
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl ValidationResult {
    pub fn from_outcome(url: impl Into<String>, outcome: ProbeOutcome, checked_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            status: outcome.status,
            status_code: outcome.status_code,
            redirect_target: outcome.redirect_target,
            error_detail: outcome.error_detail,
            latency_ms: outcome.latency_ms,
            checked_at,
        }
    }

    /// A probe that could not complete; recorded as broken with the reason.
    pub fn probe_failure(url: impl Into<String>, detail: impl Into<String>, checked_at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            status: LinkStatus::Broken,
            status_code: None,
            redirect_target: None,
            error_detail: Some(detail.into()),
            latency_ms: 0,
            checked_at,
        }
    }

    /// Valid or redirecting.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, LinkStatus::Valid | LinkStatus::Redirect)
    }

    /// Broken without an HTTP answer: the check itself failed.
    pub fn is_probe_error(&self) -> bool {
        match self.status {
            LinkStatus::Unknown => true,
            LinkStatus::Broken => self.status_code.is_none() && self.error_detail.is_some(),
            _ => false,
        }
    }

    /// Outcomes worth retrying on refresh.
    pub fn is_transient_failure(&self) -> bool {
        self.status == LinkStatus::Timeout || self.is_probe_error()
    }
}
