use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stored monthly salary slip.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Payroll {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub month: NaiveDate,
    pub base_salary: f64,
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    pub leave_days: u32,
    pub hajar_divas: u32,
    pub late_minutes: u64,
    pub late_deduction: f64,
    pub early_deduction: f64,
    pub gross_salary: f64,
    pub bonus: f64,
    pub deductions: f64,
    pub net_salary: f64,
}

pub(crate) const PAYROLL_COLUMNS: &str = r#"
    id, employee_id, month, base_salary, present_days, late_days, absent_days,
    leave_days, hajar_divas, late_minutes, late_deduction, early_deduction,
    gross_salary, bonus, deductions, net_salary
"#;
