//! Weekly compliance classification for clinician review.

use serde::{Deserialize, Serialize};

/// Days with less than this many hours of wear count as skipped entirely.
pub const SKIPPED_DAY_MAX_HOURS: f64 = 0.1;
/// A weekly average below this marks low usage.
pub const LOW_AVERAGE_HOURS: f64 = 20.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Compliance {
    Green,
    Yellow,
    Red,
}

impl Compliance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compliance::Green => "green",
            Compliance::Yellow => "yellow",
            Compliance::Red => "red",
        }
    }
}

/// Classify a trailing week of daily wear totals. First match wins: any
/// skipped day is Red regardless of the average; a low average is Yellow;
/// otherwise Green. The average runs over all 7 values, zero days
/// included.
pub fn classify_week(daily_hours: &[f64; 7]) -> Compliance {
    if daily_hours.iter().any(|hours| *hours < SKIPPED_DAY_MAX_HOURS) {
        return Compliance::Red;
    }

    let average = daily_hours.iter().sum::<f64>() / daily_hours.len() as f64;
    if average < LOW_AVERAGE_HOURS {
        Compliance::Yellow
    } else {
        Compliance::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_day_is_red_regardless_of_average() {
        assert_eq!(
            classify_week(&[0.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0]),
            Compliance::Red
        );
        // Even a high-average week with one gap day stays red.
        assert_eq!(
            classify_week(&[0.05, 23.0, 23.0, 23.0, 23.0, 23.0, 23.0]),
            Compliance::Red
        );
    }

    #[test]
    fn low_average_without_gaps_is_yellow() {
        assert_eq!(classify_week(&[3.0; 7]), Compliance::Yellow);
    }

    #[test]
    fn steady_high_wear_is_green() {
        assert_eq!(classify_week(&[22.0; 7]), Compliance::Green);
    }

    #[test]
    fn boundary_values() {
        // Exactly 0.1 hours does not count as skipped.
        assert_eq!(classify_week(&[0.1, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0]), Compliance::Yellow);
        // An average of exactly 20 is not low usage.
        assert_eq!(classify_week(&[20.0; 7]), Compliance::Green);
    }
}
