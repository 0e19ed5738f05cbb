//! Invalidation Module
//!
//! Event-driven cache invalidation: rules map URL patterns to cache namespaces,
//! matched events purge entries, and a prioritized refresh queue re-populates
//! them with per-strategy retries and backoff.

mod audit_log;
mod manager;
mod refresh;
mod rules;

pub use audit_log::{
    InvalidationLog, InvalidationRecord, InvalidationStats, MAX_LOG_RECORDS,
    MAX_STATS_DAYS,
};
pub use manager::{EventOutcome, InvalidationManager, RefreshReport};
pub use refresh::{
    RefreshItem, RefreshPriority, RefreshQueue, RefreshStrategy, RefreshTarget, MAX_REFRESH_BATCH,
};
pub use rules::{default_rules, CompiledRule, RuleSet};
