//! Running validation counters

use serde::Serialize;

use crate::models::{LinkStatus, ValidationResult};

/// Totals since start-up. Each cache hit and each probe is counted once; a URL
/// repeated within one batch is probed and counted once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub total: u64,
    pub cache_hits: u64,
    /// Valid or redirect
    pub valid: u64,
    pub broken: u64,
    pub timeouts: u64,
    /// The check itself failed (no HTTP answer, or status unknown)
    pub errors: u64,
    pub local_checks: u64,
    pub external_checks: u64,
}

impl ValidationStats {
    pub fn record_cache_hit(&mut self) {
        self.total += 1;
        self.cache_hits += 1;
    }

    pub fn record_check(&mut self, result: &ValidationResult, local: bool) {
        self.total += 1;
        if local {
            self.local_checks += 1;
        } else {
            self.external_checks += 1;
        }

        if result.is_probe_error() {
            self.errors += 1;
            return;
        }
        match result.status {
            LinkStatus::Valid | LinkStatus::Redirect => self.valid += 1,
            LinkStatus::Broken => self.broken += 1,
            LinkStatus::Timeout => self.timeouts += 1,
            LinkStatus::Unknown => self.errors += 1,
        }
    }

    /// Share of results served from cache.
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total as f64
        }
    }
}
