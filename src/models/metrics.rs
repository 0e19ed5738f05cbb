//! Aggregate audit metrics read back from the store

use serde::{Deserialize, Serialize};

use crate::models::{LinkStatus, ValidationResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub total_links: usize,
    pub valid: usize,
    pub broken: usize,
    pub redirects: usize,
    pub timeouts: usize,
    pub unknown: usize,
    pub average_latency_ms: f64,
}

impl AuditMetrics {
    /// Aggregates the latest result per URL.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ValidationResult>) -> Self {
        let mut metrics = AuditMetrics::default();
        let mut latency_total = 0u64;

        for result in results {
            metrics.total_links += 1;
            latency_total += result.latency_ms;
            match result.status {
                LinkStatus::Valid => metrics.valid += 1,
                LinkStatus::Broken => metrics.broken += 1,
                LinkStatus::Redirect => metrics.redirects += 1,
                LinkStatus::Timeout => metrics.timeouts += 1,
                LinkStatus::Unknown => metrics.unknown += 1,
            }
        }

        if metrics.total_links > 0 {
            metrics.average_latency_ms = latency_total as f64 / metrics.total_links as f64;
        }
        metrics
    }

    /// Share of links that are broken or timing out.
    pub fn failure_rate(&self) -> f64 {
        if self.total_links == 0 {
            0.0
        } else {
            (self.broken + self.timeouts) as f64 / self.total_links as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeOutcome;
    use chrono::Utc;

    #[test]
    fn test_from_results() {
        let now = Utc::now();
        let results = vec![
            ValidationResult::from_outcome("/a", ProbeOutcome::valid(Some(200), 10), now),
            ValidationResult::from_outcome("/b", ProbeOutcome::broken(Some(404), "HTTP 404", 20), now),
            ValidationResult::from_outcome("/c", ProbeOutcome::timeout(30), now),
            ValidationResult::from_outcome("/d", ProbeOutcome::redirect(301, "/e", 40), now),
        ];
        let metrics = AuditMetrics::from_results(&results);

        assert_eq!(metrics.total_links, 4);
        assert_eq!(metrics.valid, 1);
        assert_eq!(metrics.broken, 1);
        assert_eq!(metrics.timeouts, 1);
        assert_eq!(metrics.redirects, 1);
        assert_eq!(metrics.average_latency_ms, 25.0);
        assert_eq!(metrics.failure_rate(), 0.5);
    }

    #[test]
    fn test_empty_metrics() {
        let metrics = AuditMetrics::from_results(&[]);
        assert_eq!(metrics.total_links, 0);
        assert_eq!(metrics.failure_rate(), 0.0);
    }
}
