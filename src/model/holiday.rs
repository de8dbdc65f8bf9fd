use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Holiday {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "2026-08-15", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Independence Day")]
    pub name: String,
    #[schema(nullable = true)]
    pub description: Option<String>,
}
