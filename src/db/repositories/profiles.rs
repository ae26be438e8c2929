use anyhow::Result;
use rusqlite::{params, params_from_iter, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_role},
};
use crate::models::{Assignment, Profile};

fn row_to_profile(row: &Row) -> Result<Profile> {
    let role: String = row.get("role")?;
    let created_at: String = row.get("created_at")?;

    Ok(Profile {
        id: row.get("id")?,
        username: row.get("username")?,
        role: parse_role(&role)?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

fn row_to_assignment(row: &Row) -> Result<Assignment> {
    let created_at: String = row.get("created_at")?;

    Ok(Assignment {
        patient_id: row.get("patient_id")?,
        clinician_id: row.get("clinician_id")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        let record = profile.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO profiles (id, username, role, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     username = excluded.username,
                     role = excluded.role",
                params![
                    record.id,
                    record.username,
                    record.role.as_str(),
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        let profile_id = profile_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, role, created_at FROM profiles WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![profile_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_profile(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn get_profiles(&self, profile_ids: &[String]) -> Result<Vec<Profile>> {
        if profile_ids.is_empty() {
            return Ok(Vec::new());
        }

        let profile_ids = profile_ids.to_vec();
        self.execute(move |conn| {
            let placeholders = vec!["?"; profile_ids.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT id, username, role, created_at FROM profiles
                 WHERE id IN ({placeholders})
                 ORDER BY username ASC"
            ))?;

            let mut rows = stmt.query(params_from_iter(profile_ids))?;
            let mut profiles = Vec::new();
            while let Some(row) = rows.next()? {
                profiles.push(row_to_profile(row)?);
            }
            Ok(profiles)
        })
        .await
    }

    /// Fails with a constraint violation when the patient already has a
    /// clinician; callers translate that into a domain message.
    pub async fn insert_assignment(&self, assignment: &Assignment) -> Result<()> {
        let record = assignment.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO assignments (patient_id, clinician_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.patient_id,
                    record.clinician_id,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn assignments_for_clinician(
        &self,
        clinician_id: &str,
    ) -> Result<Vec<Assignment>> {
        let clinician_id = clinician_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT patient_id, clinician_id, created_at
                 FROM assignments
                 WHERE clinician_id = ?1
                 ORDER BY created_at ASC",
            )?;
            let mut rows = stmt.query(params![clinician_id])?;
            let mut assignments = Vec::new();
            while let Some(row) = rows.next()? {
                assignments.push(row_to_assignment(row)?);
            }
            Ok(assignments)
        })
        .await
    }
}
