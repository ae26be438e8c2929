use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::IntervalLog;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Running,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Idle
    }
}

/// In-memory projection of the user's open interval. The store is the
/// sole authority on whether a session is running; this cache only feeds
/// display snapshots and is re-derived from queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub status: SessionStatus,
    pub user_id: Option<String>,
    pub active_log_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, log: &IntervalLog) {
        self.status = SessionStatus::Running;
        self.user_id = Some(log.user_id.clone());
        self.active_log_id = Some(log.id.clone());
        self.started_at = Some(log.start_time);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Elapsed wear time at `now`, always recomputed from `started_at`;
    /// display timers never accumulate authoritative time.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        match (self.status, self.started_at) {
            (SessionStatus::Running, Some(started_at)) => {
                (now - started_at).max(Duration::zero())
            }
            _ => Duration::zero(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LogOrigin, LogStatus};
    use chrono::TimeZone;

    #[test]
    fn elapsed_is_zero_when_idle() {
        let state = SessionState::new();
        assert_eq!(state.elapsed(Utc::now()), Duration::zero());
    }

    #[test]
    fn elapsed_recomputes_from_start() {
        let start = Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap();
        let log = IntervalLog {
            id: "log-1".to_string(),
            user_id: "user-1".to_string(),
            start_time: start,
            end_time: None,
            status: LogStatus::Running,
            reason: None,
            origin: LogOrigin::User,
            created_at: start,
            updated_at: start,
        };

        let mut state = SessionState::new();
        state.begin(&log);

        let now = Utc.with_ymd_and_hms(2024, 3, 14, 10, 30, 0).unwrap();
        assert_eq!(state.elapsed(now).num_minutes(), 90);

        state.clear();
        assert_eq!(state.status, SessionStatus::Idle);
        assert_eq!(state.elapsed(now), Duration::zero());
    }
}
