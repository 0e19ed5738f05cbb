//! Batch Validator Module
//!
//! Turns lists of links into validation results: cache first, then local links
//! in bounded parallel chunks and external links through the rate-limited queue.
//! Every fresh result is written back to the cache and to the durable store.

mod batch;
mod rate_limit;
mod stats;

use tracing::debug;

use crate::clock::Clock;
use crate::models::{ScannedLink, ValidationResult};
use crate::ports::Prober;

pub use batch::BatchValidator;
pub use rate_limit::RateLimitedQueue;
pub use stats::ValidationStats;

/// Probes one link; a prober error becomes a broken result carrying the reason.
pub(crate) async fn check_link(
    prober: &dyn Prober,
    link: &ScannedLink,
    clock: &dyn Clock,
) -> ValidationResult {
    match prober.probe(link).await {
        Ok(outcome) => ValidationResult::from_outcome(link.url.as_str(), outcome, clock.now_utc()),
        Err(e) => {
            debug!("Probe of {} failed: {}", link.url, e);
            ValidationResult::probe_failure(link.url.as_str(), e.to_string(), clock.now_utc())
        }
    }
}
