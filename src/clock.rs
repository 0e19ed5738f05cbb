//! Clock Module
//!
//! Time source shared by the cache, invalidation log and scheduler. Production
//! code uses [`SystemClock`]; tests drive time explicitly through [`ManualClock`].

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

/// Source of "now" in Unix milliseconds.
pub trait Clock: Send + Sync + Debug {
    /// Current Unix timestamp in milliseconds.
    fn now_ms(&self) -> u64;

    /// Current time as a UTC datetime.
    fn now_utc(&self) -> DateTime<Utc> {
        ms_to_utc(self.now_ms())
    }
}

// == System Clock ==
/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

// == Manual Clock ==
/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Moves the clock forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jumps the clock to an absolute timestamp.
    pub fn set_ms(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// == Utility Functions ==
/// Converts Unix milliseconds into a UTC datetime (epoch on overflow).
pub fn ms_to_utc(ms: u64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms as i64).unwrap_or_default()
}

/// Longest configurable span in seconds (ten years).
pub const MAX_SPAN_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Seconds as a chrono span, clamped to [`MAX_SPAN_SECS`].
pub fn seconds_span(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_SPAN_SECS) as i64)
}

/// Converts a UTC datetime into Unix milliseconds (0 before the epoch).
pub fn utc_to_ms(at: DateTime<Utc>) -> u64 {
    at.timestamp_millis().max(0) as u64
}
