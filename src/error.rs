use thiserror::Error;

/// Error kinds surfaced by the tracking components. Store internals use
/// `anyhow`; failures are classified at this boundary and propagate to the
/// caller without retries.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Transient(#[source] anyhow::Error),
}

impl TrackError {
    /// Classify a store-layer failure: uniqueness violations become
    /// `Conflict`, everything else is treated as transient I/O.
    pub(crate) fn from_store(err: anyhow::Error) -> Self {
        if is_constraint_violation(&err) {
            return TrackError::Conflict("record violates a uniqueness constraint".into());
        }
        TrackError::Transient(err)
    }
}

fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(code, _))
                if code.code == rusqlite::ErrorCode::ConstraintViolation
        )
    })
}

pub type TrackResult<T> = Result<T, TrackError>;
