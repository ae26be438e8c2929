use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user aligner change cycle. `cycle_start` anchors the 7-day window;
/// `is_active` is false once the user finishes tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleState {
    pub user_id: String,
    pub cycle_start: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}
