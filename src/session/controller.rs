use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{TrackError, TrackResult};
use crate::models::{IntervalLog, LogOrigin, LogStatus};
use crate::normalizer;

use super::revalidate::{revalidation_loop, CHECK_INTERVAL_SECS};
use super::state::SessionState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub elapsed_secs: i64,
}

struct Ticker {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the per-user wearing / not-wearing state machine: opens and closes
/// interval logs and runs the periodic day-boundary re-validation while a
/// session is open.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    db: Database,
    ticker: Arc<Mutex<Option<Ticker>>>,
    check_interval: Duration,
}

impl SessionController {
    pub fn new(db: Database) -> Self {
        let debug_mode = std::env::var("ALIGNTRACK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            db,
            ticker: Arc::new(Mutex::new(None)),
            check_interval: Duration::from_secs(if debug_mode { 1 } else { CHECK_INTERVAL_SECS }),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.state.lock().await;
        SessionSnapshot {
            elapsed_secs: guard.elapsed(Utc::now()).num_seconds(),
            state: guard.clone(),
        }
    }

    /// Open a new wear interval. The store's uniqueness index over Running
    /// rows makes this a conditional insert: a concurrent second start for
    /// the same user surfaces as a Conflict instead of a duplicate open
    /// interval.
    pub async fn start(&self, user_id: &str) -> TrackResult<IntervalLog> {
        let now = Utc::now();
        let log = IntervalLog {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_time: now,
            end_time: None,
            status: LogStatus::Running,
            reason: None,
            origin: LogOrigin::User,
            created_at: now,
            updated_at: now,
        };

        self.db
            .insert_log(&log)
            .await
            .map_err(TrackError::from_store)?;

        self.state.lock().await.begin(&log);
        self.spawn_ticker(user_id).await;

        info!("started wear interval {} for {}", log.id, user_id);
        Ok(log)
    }

    /// Close the given interval with a user-chosen category. Unconditional:
    /// it does not verify the log is still Running, and pausing an already
    /// closed log re-stamps its `end_time`.
    pub async fn pause(
        &self,
        log_id: &str,
        reason: Option<String>,
    ) -> TrackResult<IntervalLog> {
        let now = Utc::now();
        let updated = self
            .db
            .close_log(log_id, now, LogStatus::Paused, reason, LogOrigin::User, now)
            .await
            .map_err(TrackError::from_store)?
            .ok_or_else(|| TrackError::NotFound(format!("interval log {log_id} not found")))?;

        if self.clear_if_active(log_id).await {
            self.cancel_ticker().await;
        }

        Ok(updated)
    }

    /// Backfill a closed interval with explicit bounds. Overlap with
    /// existing logs is not checked.
    pub async fn add_manual_entry(
        &self,
        user_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        reason: Option<String>,
    ) -> TrackResult<IntervalLog> {
        if end_time <= start_time {
            return Err(TrackError::Validation(
                "manual entry must end after it starts".into(),
            ));
        }

        let now = Utc::now();
        let log = IntervalLog {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            start_time,
            end_time: Some(end_time),
            status: LogStatus::Stopped,
            reason,
            origin: LogOrigin::Manual,
            created_at: now,
            updated_at: now,
        };

        self.db
            .insert_log(&log)
            .await
            .map_err(TrackError::from_store)?;
        Ok(log)
    }

    pub async fn delete(&self, log_id: &str) -> TrackResult<()> {
        let rows_affected = self
            .db
            .delete_log(log_id)
            .await
            .map_err(TrackError::from_store)?;

        if rows_affected == 0 {
            return Err(TrackError::NotFound(format!(
                "interval log {log_id} not found"
            )));
        }

        if self.clear_if_active(log_id).await {
            warn!("deleted the open interval {log_id}");
            self.cancel_ticker().await;
        }

        Ok(())
    }

    /// Reconnect path: re-derive the active session from the store, run
    /// one midnight-split pass over a discovered open interval, and
    /// restart the periodic re-validation.
    pub async fn resume(&self, user_id: &str) -> TrackResult<Option<IntervalLog>> {
        let running = self
            .db
            .get_running_log(user_id)
            .await
            .map_err(TrackError::from_store)?;

        let Some(log) = running else {
            self.state.lock().await.clear();
            self.cancel_ticker().await;
            return Ok(None);
        };

        let active = match normalizer::ensure_current_day(&self.db, &log, Utc::now()).await? {
            Some(successor) => successor,
            None => log,
        };

        self.state.lock().await.begin(&active);
        self.spawn_ticker(user_id).await;
        Ok(Some(active))
    }

    /// Logs starting on `date`, ready for `aggregate::daily_total`.
    pub async fn logs_for_day(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> TrackResult<Vec<IntervalLog>> {
        self.db
            .logs_in_range(user_id, normalizer::day_start(date), normalizer::day_end(date))
            .await
            .map_err(TrackError::from_store)
    }

    /// Logs starting within the trailing week `[anchor - 6, anchor]`,
    /// ready for `aggregate::weekly_series`.
    pub async fn logs_for_week(
        &self,
        user_id: &str,
        anchor: NaiveDate,
    ) -> TrackResult<Vec<IntervalLog>> {
        let from = normalizer::day_start(anchor - chrono::Duration::days(6));
        let to = normalizer::day_end(anchor);
        self.db
            .logs_in_range(user_id, from, to)
            .await
            .map_err(TrackError::from_store)
    }

    /// Cycle-end coupling: force-close the user's open interval, if any,
    /// with the CycleEnd origin tag. Called by the cycle scheduler only.
    pub(crate) async fn end_for_cycle(&self, user_id: &str) -> TrackResult<Option<IntervalLog>> {
        let running = self
            .db
            .get_running_log(user_id)
            .await
            .map_err(TrackError::from_store)?;

        let Some(log) = running else {
            return Ok(None);
        };

        let now = Utc::now();
        let closed = self
            .db
            .close_log(&log.id, now, LogStatus::Paused, None, LogOrigin::CycleEnd, now)
            .await
            .map_err(TrackError::from_store)?
            .ok_or_else(|| TrackError::NotFound(format!("interval log {} not found", log.id)))?;

        if self.clear_if_active(&log.id).await {
            self.cancel_ticker().await;
        }

        info!("closed interval {} because the aligner cycle ended", log.id);
        Ok(Some(closed))
    }

    async fn clear_if_active(&self, log_id: &str) -> bool {
        let mut guard = self.state.lock().await;
        if guard.active_log_id.as_deref() == Some(log_id) {
            guard.clear();
            true
        } else {
            false
        }
    }

    async fn spawn_ticker(&self, user_id: &str) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel_token.cancel();
            previous.handle.abort();
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(revalidation_loop(
            user_id.to_string(),
            self.db.clone(),
            self.state.clone(),
            cancel_token.clone(),
            self.check_interval,
        ));

        *ticker_guard = Some(Ticker {
            cancel_token,
            handle,
        });
    }

    async fn cancel_ticker(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(Ticker {
            cancel_token,
            handle,
        }) = ticker
        {
            cancel_token.cancel();
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!("re-validation task failed to join: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;
    use chrono::TimeZone;

    fn controller() -> SessionController {
        SessionController::new(Database::open_temp().unwrap())
    }

    #[tokio::test]
    async fn start_creates_a_running_log() {
        let sessions = controller();
        let log = sessions.start("user-1").await.unwrap();

        assert_eq!(log.status, LogStatus::Running);
        assert!(log.end_time.is_none());
        assert_eq!(log.origin, LogOrigin::User);

        let snapshot = sessions.snapshot().await;
        assert_eq!(snapshot.state.status, SessionStatus::Running);
        assert_eq!(snapshot.state.active_log_id.as_deref(), Some(log.id.as_str()));
    }

    #[tokio::test]
    async fn second_start_for_the_same_user_conflicts() {
        let sessions = controller();
        sessions.start("user-1").await.unwrap();

        let err = sessions.start("user-1").await.unwrap_err();
        assert!(matches!(err, TrackError::Conflict(_)));

        // A different user is unaffected.
        sessions.start("user-2").await.unwrap();
    }

    #[tokio::test]
    async fn pause_closes_with_reason_and_clears_state() {
        let sessions = controller();
        let log = sessions.start("user-1").await.unwrap();

        let closed = sessions
            .pause(&log.id, Some("Eating".to_string()))
            .await
            .unwrap();
        assert_eq!(closed.status, LogStatus::Paused);
        assert!(closed.end_time.is_some());
        assert_eq!(closed.reason.as_deref(), Some("Eating"));
        assert_eq!(closed.origin, LogOrigin::User);

        let snapshot = sessions.snapshot().await;
        assert_eq!(snapshot.state.status, SessionStatus::Idle);
        assert_eq!(snapshot.elapsed_secs, 0);
    }

    #[tokio::test]
    async fn pause_of_a_missing_log_is_not_found() {
        let sessions = controller();
        let err = sessions.pause("nope", None).await.unwrap_err();
        assert!(matches!(err, TrackError::NotFound(_)));
    }

    #[tokio::test]
    async fn manual_entry_rejects_inverted_bounds() {
        let sessions = controller();
        let start = Utc.with_ymd_and_hms(2024, 3, 14, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap();

        let err = sessions
            .add_manual_entry("user-1", start, end, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TrackError::Validation(_)));
    }

    #[tokio::test]
    async fn manual_entry_inserts_a_closed_log() {
        let sessions = controller();
        let start = Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 14, 10, 30, 0).unwrap();

        let log = sessions
            .add_manual_entry("user-1", start, end, Some("Forgot to track".to_string()))
            .await
            .unwrap();
        assert_eq!(log.status, LogStatus::Stopped);
        assert_eq!(log.origin, LogOrigin::Manual);
        assert_eq!(log.end_time, Some(end));

        // A backfilled entry never becomes the active session.
        let snapshot = sessions.snapshot().await;
        assert_eq!(snapshot.state.status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn delete_removes_a_log_once() {
        let sessions = controller();
        let log = sessions.start("user-1").await.unwrap();

        sessions.delete(&log.id).await.unwrap();
        let err = sessions.delete(&log.id).await.unwrap_err();
        assert!(matches!(err, TrackError::NotFound(_)));
    }

    #[tokio::test]
    async fn resume_adopts_the_stored_open_interval() {
        let db = Database::open_temp().unwrap();
        let sessions = SessionController::new(db.clone());

        assert!(sessions.resume("user-1").await.unwrap().is_none());

        let started = sessions.start("user-1").await.unwrap();

        // A fresh controller over the same store discovers the session.
        let reconnected = SessionController::new(db);
        let adopted = reconnected.resume("user-1").await.unwrap().unwrap();
        assert_eq!(adopted.id, started.id);
        assert_eq!(
            reconnected.snapshot().await.state.active_log_id,
            Some(started.id)
        );
    }

    #[tokio::test]
    async fn week_fetch_covers_the_trailing_window() {
        let sessions = controller();
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();
        sessions
            .add_manual_entry("user-1", start, end, None)
            .await
            .unwrap();

        let anchor = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
        let logs = sessions.logs_for_week("user-1", anchor).await.unwrap();
        assert_eq!(logs.len(), 1);

        let stale_anchor = NaiveDate::from_ymd_opt(2024, 3, 25).unwrap();
        assert!(sessions
            .logs_for_week("user-1", stale_anchor)
            .await
            .unwrap()
            .is_empty());
    }
}
