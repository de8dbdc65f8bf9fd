//! Attendance status rules and work-schedule lookup.

pub mod clock;
pub mod repository;
pub mod rules;

pub use repository::{CachedScheduleRepository, MySqlScheduleRepository, resolve_schedule};

/// What the HTTP layer shares across workers.
pub type ScheduleStore = CachedScheduleRepository<MySqlScheduleRepository>;

pub use rules::{AttendanceStatus, assess_check_in, assess_check_out};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("no work schedule found for department {0:?} and no global default configured")]
    NotFound(Option<u64>),
    #[error("invalid time of day: {0}")]
    InvalidTime(String),
    #[error("invalid work day: {0}")]
    InvalidWorkDay(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
