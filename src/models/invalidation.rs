//! Invalidation rule and event models

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheNamespace;

// == Invalidation Rule ==
/// Maps a URL regex to the cache namespaces it purges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRule {
    pub url_pattern: String,
    pub affected_namespaces: BTreeSet<CacheNamespace>,
    pub reason: String,
    /// Higher values are evaluated first
    pub priority: u8,
}

impl InvalidationRule {
    pub fn new(
        url_pattern: impl Into<String>,
        namespaces: impl IntoIterator<Item = CacheNamespace>,
        reason: impl Into<String>,
        priority: u8,
    ) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            affected_namespaces: namespaces.into_iter().collect(),
            reason: reason.into(),
            priority,
        }
    }
}

// == Event Kind ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ContentChange,
    Deployment,
    Manual,
    Scheduled,
    ErrorRecovery,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ContentChange => "content_change",
            EventKind::Deployment => "deployment",
            EventKind::Manual => "manual",
            EventKind::Scheduled => "scheduled",
            EventKind::ErrorRecovery => "error_recovery",
        }
    }
}

// == Invalidation Event ==
/// Something happened that may have made cached data stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub kind: EventKind,
    pub source: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub affected_urls: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl InvalidationEvent {
    pub fn new(kind: EventKind, source: impl Into<String>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            source: source.into(),
            occurred_at,
            affected_urls: Vec::new(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.affected_urls = urls;
        self
    }

    /// The source followed by every affected URL.
    pub fn candidate_urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.source.as_str()).chain(self.affected_urls.iter().map(String::as_str))
    }
}
