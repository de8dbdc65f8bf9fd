use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "T-014",
        "first_name": "Meera",
        "last_name": "Patel",
        "email": "meera.patel@school.edu",
        "phone": "+919876543210",
        "department_id": 2,
        "designation": "Mathematics Teacher",
        "is_teacher": true,
        "base_salary": 32000.0,
        "hire_date": "2022-06-01",
        "status": "active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "T-014")]
    pub employee_code: String,

    #[schema(example = "Meera")]
    pub first_name: String,

    #[schema(example = "Patel")]
    pub last_name: String,

    #[schema(example = "meera.patel@school.edu")]
    pub email: String,

    #[schema(example = "+919876543210", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = 2, nullable = true)]
    pub department_id: Option<u64>,

    #[schema(example = "Mathematics Teacher")]
    pub designation: String,

    pub is_teacher: bool,

    #[schema(example = 32000.0)]
    pub base_salary: f64,

    #[schema(
        example = "2022-06-01",
        value_type = String,
        format = "date"
    )]
    pub hire_date: NaiveDate,

    #[schema(example = "active")]
    pub status: String,
}

pub(crate) const EMPLOYEE_COLUMNS: &str = r#"
    id, employee_code, first_name, last_name, email, phone, department_id,
    designation, is_teacher, base_salary, hire_date, status
"#;

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
