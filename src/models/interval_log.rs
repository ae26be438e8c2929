use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LogStatus {
    Running,
    Paused,
    Stopped,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Running => "Running",
            LogStatus::Paused => "Paused",
            LogStatus::Stopped => "Stopped",
        }
    }

    /// Paused and Stopped both count as closed for aggregation; the
    /// distinction is presentational.
    pub fn is_closed(&self) -> bool {
        !matches!(self, LogStatus::Running)
    }
}

/// Which actor produced the interval's current shape. User-facing pause
/// categories live in `reason`; system markers live here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LogOrigin {
    User,
    Manual,
    DayBoundary,
    CycleEnd,
}

impl LogOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOrigin::User => "User",
            LogOrigin::Manual => "Manual",
            LogOrigin::DayBoundary => "DayBoundary",
            LogOrigin::CycleEnd => "CycleEnd",
        }
    }
}

/// One recorded or in-progress wear interval.
///
/// Invariant: `end_time` is absent iff `status` is Running.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalLog {
    pub id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: LogStatus,
    pub reason: Option<String>,
    pub origin: LogOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntervalLog {
    /// Duration attributed to this interval at `now`; an open interval
    /// reads as `now - start_time`.
    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        let end = self.end_time.unwrap_or(now);
        (end - self.start_time).max(Duration::zero())
    }
}
