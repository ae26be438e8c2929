use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One calendar day's summed wear time within a weekly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotal {
    pub date: NaiveDate,
    pub hours: f64,
}
