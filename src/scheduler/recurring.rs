//! Recurring job triggers
//!
//! Works out which recurring jobs became due between two checks: the daily
//! full audit and the weekly report fire when their wall-clock time is
//! crossed, quick checks and alert analysis fire on fixed intervals.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};

use crate::clock::seconds_span;
use crate::config::SchedulerConfig;
use crate::models::JobKind;

/// How far back a missed calendar trigger is still honored.
const CATCH_UP_DAYS: i64 = 8;

#[derive(Debug, Clone)]
pub struct RecurringPlan {
    daily_audit_time: NaiveTime,
    weekly_report_day: Weekday,
    weekly_report_time: NaiveTime,
    quick_check_every: Duration,
    alert_every: Duration,
    last_check: DateTime<Utc>,
    last_quick_check: DateTime<Utc>,
    last_alert: DateTime<Utc>,
}

impl RecurringPlan {
    /// Interval triggers first fire one interval after `started_at`.
    pub fn new(config: &SchedulerConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            daily_audit_time: config.daily_audit_time,
            weekly_report_day: config.weekly_report_day,
            weekly_report_time: config.weekly_report_time,
            quick_check_every: seconds_span(config.quick_check_interval),
            alert_every: seconds_span(config.alert_analysis_interval),
            last_check: started_at,
            last_quick_check: started_at,
            last_alert: started_at,
        }
    }

    /// Job kinds due at `now`, each at most once per call.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<JobKind> {
        if now <= self.last_check {
            return Vec::new();
        }

        let mut due = Vec::new();
        if crossed(self.last_check, now, self.daily_audit_time, None) {
            due.push(JobKind::FullAudit);
        }
        if crossed(
            self.last_check,
            now,
            self.weekly_report_time,
            Some(self.weekly_report_day),
        ) {
            due.push(JobKind::WeeklyReport);
        }
        if now - self.last_quick_check >= self.quick_check_every {
            self.last_quick_check = now;
            due.push(JobKind::QuickCheck);
        }
        if now - self.last_alert >= self.alert_every {
            self.last_alert = now;
            due.push(JobKind::AlertAnalysis);
        }

        self.last_check = now;
        due
    }
}

/// True when some occurrence of `time` (on `weekday`, if given) lies in `(from, to]`.
fn crossed(from: DateTime<Utc>, to: DateTime<Utc>, time: NaiveTime, weekday: Option<Weekday>) -> bool {
    let first = from.date_naive().max(to.date_naive() - Duration::days(CATCH_UP_DAYS));
    let last = to.date_naive();

    first
        .iter_days()
        .take_while(|day| *day <= last)
        .filter(|day| weekday.map_or(true, |wd| day.weekday() == wd))
        .map(|day| Utc.from_utc_datetime(&day.and_time(time)))
        .any(|at| from < at && at <= to)
}
