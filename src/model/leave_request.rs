use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Who the leave is for. Student leave is filed by a teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApplicantKind {
    Staff,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Casual,
    Sick,
    Unpaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "staff")]
    pub applicant_kind: String,
    /// Staff applicant, or the teacher who filed a student's leave
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(nullable = true, example = "Aarav Shah")]
    pub student_name: Option<String>,
    #[schema(nullable = true, example = "7-B")]
    pub class_name: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(nullable = true)]
    pub reason: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    #[schema(nullable = true)]
    pub decided_by: Option<u64>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

pub(crate) const LEAVE_COLUMNS: &str = r#"
    id, applicant_kind, employee_id, student_name, class_name, start_date,
    end_date, leave_type, reason, status, decided_by, created_at
"#;

impl LeaveRequest {
    pub fn kind(&self) -> Option<ApplicantKind> {
        self.applicant_kind.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_lowercase_strings() {
        assert_eq!(LeaveStatus::Approved.as_ref(), "approved");
        assert_eq!("student".parse::<ApplicantKind>().unwrap(), ApplicantKind::Student);
        assert_eq!(LeaveType::Casual.to_string(), "casual");
        assert!("annual".parse::<LeaveType>().is_err());
    }
}
