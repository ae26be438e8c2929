//! Read-only clinician projections: trailing-week wear series and the
//! compliance signal for each assigned patient. Nothing here is
//! persisted; every overview is derived from interval logs at read time.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::aggregate::{self, DayTotal, WEEK_DAYS};
use crate::compliance::{classify_week, Compliance};
use crate::db::Database;
use crate::error::{TrackError, TrackResult};
use crate::models::{Assignment, IntervalLog, Profile};
use crate::normalizer::day_start;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientOverview {
    pub patient_id: String,
    pub username: String,
    pub series: Vec<DayTotal>,
    pub average_hours: f64,
    pub compliance: Compliance,
}

#[derive(Clone)]
pub struct ClinicianView {
    db: Database,
}

impl ClinicianView {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Assign a patient to a clinician. A patient can have at most one
    /// clinician; the store's uniqueness signal is rewritten into a
    /// domain message here.
    pub async fn assign_patient(
        &self,
        patient_id: &str,
        clinician_id: &str,
    ) -> TrackResult<Assignment> {
        let assignment = Assignment {
            patient_id: patient_id.to_string(),
            clinician_id: clinician_id.to_string(),
            created_at: Utc::now(),
        };

        self.db
            .insert_assignment(&assignment)
            .await
            .map_err(|err| match TrackError::from_store(err) {
                TrackError::Conflict(_) => {
                    TrackError::Conflict("patient is already assigned to a clinician".into())
                }
                other => other,
            })?;

        Ok(assignment)
    }

    pub async fn patients_for_clinician(&self, clinician_id: &str) -> TrackResult<Vec<Profile>> {
        let assignments = self
            .db
            .assignments_for_clinician(clinician_id)
            .await
            .map_err(TrackError::from_store)?;

        let patient_ids: Vec<String> = assignments
            .into_iter()
            .map(|assignment| assignment.patient_id)
            .collect();

        self.db
            .get_profiles(&patient_ids)
            .await
            .map_err(TrackError::from_store)
    }

    /// Trailing-week overview for every assigned patient, anchored on
    /// `now`'s calendar day. One batched log fetch covers all patients.
    pub async fn patient_overviews(
        &self,
        clinician_id: &str,
        now: DateTime<Utc>,
    ) -> TrackResult<Vec<PatientOverview>> {
        let patients = self.patients_for_clinician(clinician_id).await?;
        if patients.is_empty() {
            return Ok(Vec::new());
        }

        let anchor = now.date_naive();
        let window_start = day_start(anchor - Duration::days(WEEK_DAYS as i64 - 1));

        let patient_ids: Vec<String> = patients.iter().map(|profile| profile.id.clone()).collect();
        let logs = self
            .db
            .logs_for_users_since(&patient_ids, window_start)
            .await
            .map_err(TrackError::from_store)?;

        let mut by_patient: HashMap<String, Vec<IntervalLog>> = HashMap::new();
        for log in logs {
            by_patient.entry(log.user_id.clone()).or_default().push(log);
        }

        let overviews = patients
            .into_iter()
            .map(|profile| {
                let patient_logs = by_patient.remove(&profile.id).unwrap_or_default();
                let series = aggregate::weekly_series(&patient_logs, anchor, now);

                let mut daily_hours = [0.0; WEEK_DAYS];
                for (slot, day) in daily_hours.iter_mut().zip(series.iter()) {
                    *slot = day.hours;
                }
                let average_hours = daily_hours.iter().sum::<f64>() / WEEK_DAYS as f64;

                PatientOverview {
                    patient_id: profile.id,
                    username: profile.username,
                    series,
                    average_hours,
                    compliance: classify_week(&daily_hours),
                }
            })
            .collect();

        Ok(overviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::session::SessionController;
    use chrono::TimeZone;

    fn profile(id: &str, username: &str, role: Role) -> Profile {
        Profile {
            id: id.to_string(),
            username: username.to_string(),
            role,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_assignment_reports_the_domain_message() {
        let db = Database::open_temp().unwrap();
        let view = ClinicianView::new(db);

        view.assign_patient("patient-1", "dentist-1").await.unwrap();
        let err = view
            .assign_patient("patient-1", "dentist-2")
            .await
            .unwrap_err();

        match err {
            TrackError::Conflict(message) => {
                assert_eq!(message, "patient is already assigned to a clinician");
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn overview_classifies_each_assigned_patient() {
        let db = Database::open_temp().unwrap();
        let sessions = SessionController::new(db.clone());
        let view = ClinicianView::new(db.clone());

        db.upsert_profile(&profile("patient-1", "ana", Role::Patient))
            .await
            .unwrap();
        db.upsert_profile(&profile("dentist-1", "dr-lee", Role::Clinician))
            .await
            .unwrap();
        view.assign_patient("patient-1", "dentist-1").await.unwrap();

        // Two hours of wear yesterday; every other day empty.
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 3, 13, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 13, 11, 0, 0).unwrap();
        sessions
            .add_manual_entry("patient-1", start, end, None)
            .await
            .unwrap();

        let overviews = view.patient_overviews("dentist-1", now).await.unwrap();
        assert_eq!(overviews.len(), 1);

        let overview = &overviews[0];
        assert_eq!(overview.username, "ana");
        assert_eq!(overview.series.len(), 7);
        assert_eq!(overview.compliance, Compliance::Red);
        assert!((overview.average_hours - 2.0 / 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn clinician_without_patients_sees_an_empty_overview() {
        let db = Database::open_temp().unwrap();
        let view = ClinicianView::new(db);

        let overviews = view
            .patient_overviews("dentist-1", Utc::now())
            .await
            .unwrap();
        assert!(overviews.is_empty());
    }
}
