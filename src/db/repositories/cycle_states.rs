use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime},
};
use crate::models::CycleState;

fn row_to_cycle(row: &Row) -> Result<CycleState> {
    let cycle_start: Option<String> = row.get("cycle_start")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(CycleState {
        user_id: row.get("user_id")?,
        cycle_start: parse_optional_datetime(cycle_start, "cycle_start")?,
        is_active: row.get("is_active")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn get_cycle_state(&self, user_id: &str) -> Result<Option<CycleState>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, cycle_start, is_active, updated_at
                 FROM cycle_states
                 WHERE user_id = ?1",
            )?;
            let mut rows = stmt.query(params![user_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_cycle(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Begin (or restart) tracking: upserts the row with the supplied
    /// cycle start and marks it active.
    pub async fn activate_cycle(
        &self,
        user_id: &str,
        cycle_start: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO cycle_states (user_id, cycle_start, is_active, updated_at)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     cycle_start = excluded.cycle_start,
                     is_active = 1,
                     updated_at = excluded.updated_at",
                params![
                    user_id,
                    cycle_start.to_rfc3339(),
                    updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Re-anchor the 7-day window (aligner change confirmed). Leaves
    /// `is_active` untouched; returns rows affected.
    pub async fn reset_cycle_start(
        &self,
        user_id: &str,
        cycle_start: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<usize> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE cycle_states
                 SET cycle_start = ?1,
                     updated_at = ?2
                 WHERE user_id = ?3",
                params![
                    cycle_start.to_rfc3339(),
                    updated_at.to_rfc3339(),
                    user_id,
                ],
            )?;
            Ok(rows_affected)
        })
        .await
    }

    pub async fn deactivate_cycle(
        &self,
        user_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<usize> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE cycle_states
                 SET is_active = 0,
                     updated_at = ?1
                 WHERE user_id = ?2",
                params![updated_at.to_rfc3339(), user_id],
            )?;
            Ok(rows_affected)
        })
        .await
    }
}
