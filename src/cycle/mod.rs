//! The recurring 7-day aligner change cycle, tracked independently of
//! wear sessions.

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::{TrackError, TrackResult};
use crate::models::{CycleState, IntervalLog};
use crate::session::SessionController;

/// Days between aligner changes.
pub const CYCLE_DAYS: i64 = 7;

const DAY_MS: i64 = 86_400_000;

pub fn next_change_due(cycle_start: DateTime<Utc>) -> DateTime<Utc> {
    cycle_start + Duration::days(CYCLE_DAYS)
}

pub fn is_overdue(cycle_start: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= next_change_due(cycle_start)
}

/// Whole days until the next change, rounded up; zero or negative once
/// overdue (the display layer substitutes a "due" indicator rather than a
/// negative count).
pub fn days_remaining(cycle_start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining_ms = (next_change_due(cycle_start) - now).num_milliseconds();
    let mut days = remaining_ms.div_euclid(DAY_MS);
    if remaining_ms.rem_euclid(DAY_MS) != 0 {
        days += 1;
    }
    days
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDue {
    pub due_at: DateTime<Utc>,
    pub is_overdue: bool,
    pub days_remaining: i64,
}

pub fn change_due(cycle_start: DateTime<Utc>, now: DateTime<Utc>) -> ChangeDue {
    ChangeDue {
        due_at: next_change_due(cycle_start),
        is_overdue: is_overdue(cycle_start, now),
        days_remaining: days_remaining(cycle_start, now),
    }
}

/// Tracks per-user cycle state. Holds an explicit handle to the session
/// controller for the one cross-component mutation: stopping a cycle
/// force-closes the open wear interval.
#[derive(Clone)]
pub struct CycleScheduler {
    db: Database,
    sessions: SessionController,
}

impl CycleScheduler {
    pub fn new(db: Database, sessions: SessionController) -> Self {
        Self { db, sessions }
    }

    pub async fn cycle_state(&self, user_id: &str) -> TrackResult<Option<CycleState>> {
        self.db
            .get_cycle_state(user_id)
            .await
            .map_err(TrackError::from_store)
    }

    /// Current due status; None while no cycle is active or anchored.
    pub async fn status(&self, user_id: &str, now: DateTime<Utc>) -> TrackResult<Option<ChangeDue>> {
        let state = self.cycle_state(user_id).await?;
        Ok(state.and_then(|state| {
            if state.is_active {
                state.cycle_start.map(|start| change_due(start, now))
            } else {
                None
            }
        }))
    }

    /// Begin tracking. `start` is the user-supplied moment the aligner was
    /// first worn, not necessarily now.
    pub async fn start_cycle(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
    ) -> TrackResult<CycleState> {
        self.db
            .activate_cycle(user_id, start, Utc::now())
            .await
            .map_err(TrackError::from_store)?;

        info!("started aligner cycle for {} at {}", user_id, start);
        self.require_state(user_id).await
    }

    /// Confirm the aligner was changed: re-anchor the 7-day window at
    /// `now`. Independent of session state.
    pub async fn confirm_change(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> TrackResult<CycleState> {
        let rows_affected = self
            .db
            .reset_cycle_start(user_id, now, now)
            .await
            .map_err(TrackError::from_store)?;

        if rows_affected == 0 {
            return Err(TrackError::NotFound(format!(
                "no aligner cycle for {user_id}"
            )));
        }

        self.require_state(user_id).await
    }

    /// Finish tracking. Deactivates the cycle and, when a wear session is
    /// still open, closes it through the session controller. Returns the
    /// closed interval, if one was open.
    pub async fn stop_cycle(&self, user_id: &str) -> TrackResult<Option<IntervalLog>> {
        let rows_affected = self
            .db
            .deactivate_cycle(user_id, Utc::now())
            .await
            .map_err(TrackError::from_store)?;

        if rows_affected == 0 {
            return Err(TrackError::NotFound(format!(
                "no aligner cycle for {user_id}"
            )));
        }

        self.sessions.end_for_cycle(user_id).await
    }

    async fn require_state(&self, user_id: &str) -> TrackResult<CycleState> {
        self.cycle_state(user_id)
            .await?
            .ok_or_else(|| TrackError::NotFound(format!("no cycle state for {user_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogOrigin, LogStatus};
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn due_one_week_after_the_anchor() {
        let start = utc(2024, 3, 14, 8, 0, 0);
        assert_eq!(next_change_due(start), utc(2024, 3, 21, 8, 0, 0));
    }

    #[test]
    fn overdue_an_hour_past_the_window() {
        let start = utc(2024, 3, 14, 8, 0, 0);
        let now = utc(2024, 3, 21, 9, 0, 0);

        assert!(is_overdue(start, now));
        assert!(days_remaining(start, now) <= 0);
    }

    #[test]
    fn days_remaining_rounds_up() {
        let start = utc(2024, 3, 14, 8, 0, 0);

        assert_eq!(days_remaining(start, start), 7);
        // 6 days 1 hour left still reads as 7 days.
        assert_eq!(days_remaining(start, utc(2024, 3, 15, 7, 0, 0)), 7);
        assert_eq!(days_remaining(start, utc(2024, 3, 20, 8, 0, 0)), 1);
        // Exactly at the due instant: due now, nothing remaining.
        let due = next_change_due(start);
        assert!(is_overdue(start, due));
        assert_eq!(days_remaining(start, due), 0);
    }

    #[tokio::test]
    async fn confirm_change_reanchors_the_window() {
        let db = Database::open_temp().unwrap();
        let sessions = SessionController::new(db.clone());
        let cycles = CycleScheduler::new(db, sessions);

        cycles
            .start_cycle("user-1", utc(2024, 3, 1, 8, 0, 0))
            .await
            .unwrap();

        let now = utc(2024, 3, 14, 10, 0, 0);
        let state = cycles.confirm_change("user-1", now).await.unwrap();
        assert_eq!(state.cycle_start, Some(now));
        assert!(state.is_active);

        let due = cycles.status("user-1", now).await.unwrap().unwrap();
        assert_eq!(due.due_at, now + Duration::days(7));
        assert!(!due.is_overdue);
        assert_eq!(due.days_remaining, 7);
    }

    #[tokio::test]
    async fn confirm_change_without_a_cycle_is_not_found() {
        let db = Database::open_temp().unwrap();
        let sessions = SessionController::new(db.clone());
        let cycles = CycleScheduler::new(db, sessions);

        let err = cycles
            .confirm_change("user-1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, TrackError::NotFound(_)));
    }

    #[tokio::test]
    async fn stop_cycle_closes_the_open_interval() {
        let db = Database::open_temp().unwrap();
        let sessions = SessionController::new(db.clone());
        let cycles = CycleScheduler::new(db, sessions.clone());

        cycles.start_cycle("user-1", Utc::now()).await.unwrap();
        let log = sessions.start("user-1").await.unwrap();

        let closed = cycles.stop_cycle("user-1").await.unwrap().unwrap();
        assert_eq!(closed.id, log.id);
        assert_eq!(closed.status, LogStatus::Paused);
        assert_eq!(closed.origin, LogOrigin::CycleEnd);
        assert!(closed.end_time.is_some());

        let state = cycles.cycle_state("user-1").await.unwrap().unwrap();
        assert!(!state.is_active);

        // Status reads as None once tracking is finished.
        assert!(cycles.status("user-1", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stop_cycle_without_a_session_just_deactivates() {
        let db = Database::open_temp().unwrap();
        let sessions = SessionController::new(db.clone());
        let cycles = CycleScheduler::new(db, sessions);

        cycles.start_cycle("user-1", Utc::now()).await.unwrap();
        assert!(cycles.stop_cycle("user-1").await.unwrap().is_none());
    }
}
