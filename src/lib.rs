pub mod aggregate;
pub mod clinician;
pub mod compliance;
pub mod cycle;
pub mod db;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod session;
mod utils;

use std::path::PathBuf;

pub use aggregate::{daily_total, duration_hours, weekly_series, DayTotal};
pub use clinician::{ClinicianView, PatientOverview};
pub use compliance::{classify_week, Compliance};
pub use cycle::{ChangeDue, CycleScheduler};
pub use db::Database;
pub use error::{TrackError, TrackResult};
pub use models::{Assignment, CycleState, IntervalLog, LogOrigin, LogStatus, Profile, Role};
pub use session::{SessionController, SessionSnapshot, SessionState, SessionStatus};

/// Wires the tracking components over one database: the session
/// controller, the cycle scheduler (with its explicit handle back into
/// the session controller), and the clinician view.
pub struct Tracker {
    db: Database,
    sessions: SessionController,
    cycles: CycleScheduler,
    clinician: ClinicianView,
}

impl Tracker {
    pub fn new(db_path: PathBuf) -> anyhow::Result<Self> {
        let db = Database::new(db_path)?;
        let sessions = SessionController::new(db.clone());
        let cycles = CycleScheduler::new(db.clone(), sessions.clone());
        let clinician = ClinicianView::new(db.clone());

        Ok(Self {
            db,
            sessions,
            cycles,
            clinician,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    pub fn cycles(&self) -> &CycleScheduler {
        &self.cycles
    }

    pub fn clinician(&self) -> &ClinicianView {
        &self.clinician
    }
}

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}
