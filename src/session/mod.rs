pub mod controller;
mod revalidate;
pub mod state;

pub use controller::{SessionController, SessionSnapshot};
pub use state::{SessionState, SessionStatus};
