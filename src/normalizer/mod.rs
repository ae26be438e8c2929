//! Day-boundary normalization for open wear intervals ("midnight split").
//!
//! Daily aggregation buckets every log by the calendar day of its
//! `start_time`, so an open interval must never cross midnight. The split
//! closes the open log at the last instant of its start day and opens a
//! Running successor at the first instant of the current day, in one
//! store transaction.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{TrackError, TrackResult};
use crate::models::{IntervalLog, LogOrigin, LogStatus};

pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

/// Last instant of `day` at millisecond resolution (23:59:59.999).
pub fn day_end(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc()
}

/// If an interval started on an earlier calendar day than `now`, the pair
/// of instants to close it at and reopen from. Intervening full offline
/// days are not backfilled: the successor always starts on `now`'s day.
pub fn split_points(
    start_time: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start_day = start_time.date_naive();
    let today = now.date_naive();

    if start_day < today {
        Some((day_end(start_day), day_start(today)))
    } else {
        None
    }
}

/// Re-validate the given open interval against the current day, splitting
/// it when it has crossed midnight. Returns the Running successor so the
/// caller can retarget its active reference; None means no action was
/// needed.
pub async fn ensure_current_day(
    db: &Database,
    log: &IntervalLog,
    now: DateTime<Utc>,
) -> TrackResult<Option<IntervalLog>> {
    if log.status != LogStatus::Running {
        return Ok(None);
    }

    let Some((close_at, reopen_at)) = split_points(log.start_time, now) else {
        return Ok(None);
    };

    let successor = IntervalLog {
        id: Uuid::new_v4().to_string(),
        user_id: log.user_id.clone(),
        start_time: reopen_at,
        end_time: None,
        status: LogStatus::Running,
        reason: None,
        origin: LogOrigin::DayBoundary,
        created_at: now,
        updated_at: now,
    };

    let applied = db
        .split_running_log(&log.id, close_at, &successor, now)
        .await
        .map_err(TrackError::from_store)?;

    if !applied {
        return Err(TrackError::NotFound(format!(
            "interval log {} no longer exists",
            log.id
        )));
    }

    Ok(Some(successor))
}
