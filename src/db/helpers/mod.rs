use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{LogOrigin, LogStatus, Role};

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<LogStatus> {
    match value {
        "Running" => Ok(LogStatus::Running),
        "Paused" => Ok(LogStatus::Paused),
        "Stopped" => Ok(LogStatus::Stopped),
        other => Err(anyhow!("unknown interval status {other}")),
    }
}

pub fn parse_origin(value: &str) -> Result<LogOrigin> {
    match value {
        "User" => Ok(LogOrigin::User),
        "Manual" => Ok(LogOrigin::Manual),
        "DayBoundary" => Ok(LogOrigin::DayBoundary),
        "CycleEnd" => Ok(LogOrigin::CycleEnd),
        other => Err(anyhow!("unknown interval origin {other}")),
    }
}

pub fn parse_role(value: &str) -> Result<Role> {
    match value {
        "Patient" => Ok(Role::Patient),
        "Clinician" => Ok(Role::Clinician),
        other => Err(anyhow!("unknown profile role {other}")),
    }
}
