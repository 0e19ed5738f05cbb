//! Reporter that only logs
//!
//! Stands in for outbound notification/report delivery.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::{AuditMetrics, ScannedLink};
use crate::ports::Reporter;

/// Failure rate above which an alert is raised.
const ALERT_FAILURE_RATE: f64 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct LogReporter;

#[async_trait]
impl Reporter for LogReporter {
    async fn analyze_alerts(
        &self,
        metrics: &AuditMetrics,
        broken: &[ScannedLink],
    ) -> Result<serde_json::Value> {
        let critical: Vec<&str> = broken
            .iter()
            .filter(|link| link.priority.is_urgent())
            .map(|link| link.url.as_str())
            .collect();
        let alert = metrics.failure_rate() > ALERT_FAILURE_RATE || !critical.is_empty();

        if alert {
            warn!(
                "Link health alert: failure rate {:.1}%, {} urgent broken links",
                metrics.failure_rate() * 100.0,
                critical.len()
            );
        }

        Ok(json!({
            "alert": alert,
            "failure_rate": metrics.failure_rate(),
            "broken_total": broken.len(),
            "urgent_broken": critical,
        }))
    }

    async fn weekly_report(&self, metrics: &AuditMetrics) -> Result<serde_json::Value> {
        info!(
            "Weekly link report: {} links, {} broken, {} timeouts",
            metrics.total_links, metrics.broken, metrics.timeouts
        );
        Ok(json!({ "metrics": metrics }))
    }
}
