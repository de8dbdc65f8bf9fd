use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::report::DayRecord;

/// One row per employee per (IST) calendar day.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_in: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out: Option<DateTime<Utc>>,
    #[schema(example = "LATE")]
    pub status: String,
    pub late_minutes: u32,
    pub early_minutes: u32,
    pub overtime_minutes: u32,
    pub photo_ref: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

pub(crate) const ATTENDANCE_COLUMNS: &str = r#"
    id, employee_id, date, check_in, check_out, status, late_minutes,
    early_minutes, overtime_minutes, photo_ref, latitude, longitude, accuracy
"#;

impl Attendance {
    /// `None` when the stored status is not one we know.
    pub fn day_record(&self) -> Option<DayRecord> {
        Some(DayRecord {
            date: self.date,
            status: self.status.parse().ok()?,
            late_minutes: self.late_minutes,
            early_minutes: self.early_minutes,
        })
    }
}
