use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime, parse_origin, parse_status},
};
use crate::models::{IntervalLog, LogOrigin, LogStatus};

const LOG_COLUMNS: &str =
    "id, user_id, start_time, end_time, status, reason, origin, created_at, updated_at";

fn row_to_log(row: &Row) -> Result<IntervalLog> {
    let start_time: String = row.get("start_time")?;
    let end_time: Option<String> = row.get("end_time")?;
    let status: String = row.get("status")?;
    let origin: String = row.get("origin")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(IntervalLog {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        start_time: parse_datetime(&start_time, "start_time")?,
        end_time: parse_optional_datetime(end_time, "end_time")?,
        status: parse_status(&status)?,
        reason: row.get("reason")?,
        origin: parse_origin(&origin)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    /// Insert a new interval log. The partial unique index on Running rows
    /// makes this the conditional insert for `start`: a second open
    /// interval for the same user fails with a constraint violation.
    pub async fn insert_log(&self, log: &IntervalLog) -> Result<()> {
        let record = log.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO interval_logs (id, user_id, start_time, end_time, status, reason, origin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    record.user_id,
                    record.start_time.to_rfc3339(),
                    record.end_time.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    record.reason,
                    record.origin.as_str(),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Close an interval unconditionally: stamp `end_time`, the closed
    /// status, the user-facing reason and the origin tag. Returns the
    /// updated row, or None when the id does not exist.
    pub async fn close_log(
        &self,
        log_id: &str,
        end_time: DateTime<Utc>,
        status: LogStatus,
        reason: Option<String>,
        origin: LogOrigin,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<IntervalLog>> {
        let log_id = log_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE interval_logs
                 SET end_time = ?1,
                     status = ?2,
                     reason = ?3,
                     origin = ?4,
                     updated_at = ?5
                 WHERE id = ?6",
                params![
                    end_time.to_rfc3339(),
                    status.as_str(),
                    reason,
                    origin.as_str(),
                    updated_at.to_rfc3339(),
                    log_id,
                ],
            )?;

            if rows_affected == 0 {
                return Ok(None);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM interval_logs WHERE id = ?1"
            ))?;
            let mut rows = stmt.query(params![log_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_log(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn delete_log(&self, log_id: &str) -> Result<usize> {
        let log_id = log_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM interval_logs WHERE id = ?1",
                params![log_id],
            )?;
            Ok(rows_affected)
        })
        .await
    }

    pub async fn get_log(&self, log_id: &str) -> Result<Option<IntervalLog>> {
        let log_id = log_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM interval_logs WHERE id = ?1"
            ))?;
            let mut rows = stmt.query(params![log_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_log(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// The user's open interval, if any. The store, not client memory, is
    /// the authority on whether a session is running.
    pub async fn get_running_log(&self, user_id: &str) -> Result<Option<IntervalLog>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM interval_logs
                 WHERE user_id = ?1 AND status = 'Running'
                 ORDER BY start_time DESC
                 LIMIT 1"
            ))?;
            let mut rows = stmt.query(params![user_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_log(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Logs whose `start_time` falls within `[from, to]`, oldest first.
    pub async fn logs_in_range(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<IntervalLog>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM interval_logs
                 WHERE user_id = ?1 AND start_time >= ?2 AND start_time <= ?3
                 ORDER BY start_time ASC"
            ))?;

            let mut rows = stmt.query(params![
                user_id,
                from.to_rfc3339(),
                to.to_rfc3339()
            ])?;
            let mut logs = Vec::new();
            while let Some(row) = rows.next()? {
                logs.push(row_to_log(row)?);
            }
            Ok(logs)
        })
        .await
    }

    /// Batched fetch for clinician review: all logs of the given users
    /// starting at or after `from`.
    pub async fn logs_for_users_since(
        &self,
        user_ids: &[String],
        from: DateTime<Utc>,
    ) -> Result<Vec<IntervalLog>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let user_ids = user_ids.to_vec();
        self.execute(move |conn| {
            let placeholders = vec!["?"; user_ids.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOG_COLUMNS} FROM interval_logs
                 WHERE user_id IN ({placeholders}) AND start_time >= ?
                 ORDER BY start_time ASC"
            ))?;

            let mut values: Vec<String> = user_ids;
            values.push(from.to_rfc3339());

            let mut rows = stmt.query(params_from_iter(values))?;
            let mut logs = Vec::new();
            while let Some(row) = rows.next()? {
                logs.push(row_to_log(row)?);
            }
            Ok(logs)
        })
        .await
    }

    /// Close the open interval at the day boundary and insert its Running
    /// successor in one transaction, so a crash cannot strand a closed log
    /// without a successor. Returns false (and writes nothing) when the
    /// log to close no longer exists.
    pub async fn split_running_log(
        &self,
        log_id: &str,
        close_at: DateTime<Utc>,
        successor: &IntervalLog,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        let log_id = log_id.to_string();
        let successor = successor.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            let rows_affected = tx.execute(
                "UPDATE interval_logs
                 SET end_time = ?1,
                     status = ?2,
                     origin = ?3,
                     updated_at = ?4
                 WHERE id = ?5",
                params![
                    close_at.to_rfc3339(),
                    LogStatus::Paused.as_str(),
                    LogOrigin::DayBoundary.as_str(),
                    updated_at.to_rfc3339(),
                    log_id,
                ],
            )?;

            if rows_affected == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO interval_logs (id, user_id, start_time, end_time, status, reason, origin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    successor.id,
                    successor.user_id,
                    successor.start_time.to_rfc3339(),
                    successor.end_time.as_ref().map(|dt| dt.to_rfc3339()),
                    successor.status.as_str(),
                    successor.reason,
                    successor.origin.as_str(),
                    successor.created_at.to_rfc3339(),
                    successor.updated_at.to_rfc3339(),
                ],
            )?;

            tx.commit()?;
            Ok(true)
        })
        .await
    }
}
