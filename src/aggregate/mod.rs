//! Reduction of interval logs into daily and weekly wear totals.
//!
//! Every log is bucketed by the calendar day of its `start_time`; the
//! normalizer guarantees no open interval spans midnight, so no log can
//! contribute to two buckets. Durations are always recomputed from the
//! stored bounds (or "now" for the open interval) at read time.

mod types;

pub use types::DayTotal;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::models::IntervalLog;

/// Number of calendar days covered by a weekly series.
pub const WEEK_DAYS: usize = 7;

pub fn duration_hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.0
}

/// Total wear time for `date`. `logs` must already be filtered to those
/// whose `start_time` falls on `date`. Closed logs contribute their full
/// span; a Running log contributes `now - start_time`, and only when the
/// requested date is the current day.
pub fn daily_total(date: NaiveDate, logs: &[IntervalLog], now: DateTime<Utc>) -> Duration {
    let mut total = Duration::zero();

    for log in logs {
        if !log.status.is_closed() {
            continue;
        }
        if let Some(end_time) = log.end_time {
            total = total + (end_time - log.start_time).max(Duration::zero());
        }
    }

    if date == now.date_naive() {
        if let Some(open) = logs.iter().find(|log| !log.status.is_closed()) {
            total = total + (now - open.start_time).max(Duration::zero());
        }
    }

    total
}

/// Bucket logs into the 7 calendar days `[anchor - 6, anchor]`, oldest
/// first. A Running log's end reads as `now`. Logs starting outside the
/// window are ignored.
pub fn weekly_series(logs: &[IntervalLog], anchor: NaiveDate, now: DateTime<Utc>) -> Vec<DayTotal> {
    (0..WEEK_DAYS as i64)
        .map(|offset| {
            let date = anchor - Duration::days(WEEK_DAYS as i64 - 1 - offset);
            let total: Duration = logs
                .iter()
                .filter(|log| log.start_time.date_naive() == date)
                .fold(Duration::zero(), |acc, log| acc + log.duration_at(now));

            DayTotal {
                date,
                hours: duration_hours(total),
            }
        })
        .collect()
}
