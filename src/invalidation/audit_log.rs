//! Append-only record of processed invalidation events

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::EventKind;

/// Oldest records are dropped past this many.
pub const MAX_LOG_RECORDS: usize = 10_000;

/// Widest look-back window accepted by [`InvalidationLog::stats`].
pub const MAX_STATS_DAYS: u32 = 36_500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidationRecord {
    pub kind: EventKind,
    pub source: String,
    pub occurred_at: DateTime<Utc>,
    pub rules_applied: usize,
    pub entries_invalidated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidationStats {
    pub days: u32,
    pub total_events: usize,
    pub events_by_kind: BTreeMap<EventKind, usize>,
    pub total_invalidated: usize,
    pub average_per_event: f64,
}

#[derive(Debug, Default)]
pub struct InvalidationLog {
    records: VecDeque<InvalidationRecord>,
}

impl InvalidationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: InvalidationRecord) {
        if self.records.len() >= MAX_LOG_RECORDS {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Aggregates events that occurred within `days` of `now`. Windows wider
    /// than [`MAX_STATS_DAYS`] are narrowed to it.
    pub fn stats(&self, days: u32, now: DateTime<Utc>) -> InvalidationStats {
        let days = days.min(MAX_STATS_DAYS);
        let since = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut events_by_kind = BTreeMap::new();
        let mut total_events = 0;
        let mut total_invalidated = 0;

        for record in self.records.iter().filter(|r| r.occurred_at >= since) {
            *events_by_kind.entry(record.kind).or_insert(0) += 1;
            total_events += 1;
            total_invalidated += record.entries_invalidated;
        }

        let average_per_event = if total_events == 0 {
            0.0
        } else {
            total_invalidated as f64 / total_events as f64
        };

        InvalidationStats {
            days,
            total_events,
            events_by_kind,
            total_invalidated,
            average_per_event,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: EventKind, at: DateTime<Utc>, invalidated: usize) -> InvalidationRecord {
        InvalidationRecord {
            kind,
            source: "test".to_string(),
            occurred_at: at,
            rules_applied: 1,
            entries_invalidated: invalidated,
        }
    }

    #[test]
    fn test_stats_window_and_average() {
        let now = Utc::now();
        let mut log = InvalidationLog::new();
        log.append(record(EventKind::Deployment, now - Duration::days(10), 100));
        log.append(record(EventKind::Deployment, now - Duration::hours(2), 4));
        log.append(record(EventKind::ContentChange, now - Duration::hours(1), 2));

        let stats = log.stats(7, now);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.total_invalidated, 6);
        assert_eq!(stats.events_by_kind[&EventKind::Deployment], 1);
        assert_eq!(stats.events_by_kind[&EventKind::ContentChange], 1);
        assert!((stats.average_per_event - 3.0).abs() < f64::EPSILON);

        assert_eq!(log.stats(30, now).total_events, 3);
    }

    #[test]
    fn test_empty_stats() {
        let stats = InvalidationLog::new().stats(7, Utc::now());
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.average_per_event, 0.0);
    }

    #[test]
    fn test_stats_with_unbounded_window() {
        let now = Utc::now();
        let mut log = InvalidationLog::new();
        log.append(record(EventKind::Manual, now - Duration::days(3_000), 5));
        log.append(record(EventKind::Manual, now, 1));

        let stats = log.stats(u32::MAX, now);
        assert_eq!(stats.days, MAX_STATS_DAYS);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.total_invalidated, 6);
    }

    #[test]
    fn test_log_is_bounded() {
        let now = Utc::now();
        let mut log = InvalidationLog::new();
        for _ in 0..MAX_LOG_RECORDS + 5 {
            log.append(record(EventKind::Manual, now, 0));
        }
        assert_eq!(log.len(), MAX_LOG_RECORDS);
    }
}
