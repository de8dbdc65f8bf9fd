use crate::{
    api::{db_error, is_duplicate_key, message},
    auth::auth::AuthUser,
    model::holiday::Holiday,
    models::MessageResponse,
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct HolidayQuery {
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateHoliday {
    #[schema(example = "2026-08-15", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "Independence Day")]
    pub name: String,
    pub description: Option<String>,
}

/// Name of the holiday on `date`, if there is one.
pub(crate) async fn holiday_on(pool: &MySqlPool, date: NaiveDate) -> actix_web::Result<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT name FROM holidays WHERE date = ? LIMIT 1")
        .bind(date)
        .fetch_optional(pool)
        .await
        .map_err(|e| db_error(e, "Failed to check holiday"))
}

pub(crate) async fn holidays_between(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> actix_web::Result<Vec<NaiveDate>> {
    sqlx::query_scalar::<_, NaiveDate>("SELECT date FROM holidays WHERE date BETWEEN ? AND ? ORDER BY date")
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
        .map_err(|e| db_error(e, "Failed to fetch holidays"))
}

/// List holidays of a year
#[utoipa::path(
    get,
    path = "/api/holidays",
    params(HolidayQuery),
    responses((status = 200, description = "Holidays ordered by date", body = [Holiday])),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn list_holidays(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayQuery>,
) -> actix_web::Result<impl Responder> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let (Some(from), Some(to)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return Ok(message(StatusCode::BAD_REQUEST, "Invalid year"));
    };

    let holidays = sqlx::query_as::<_, Holiday>(
        "SELECT id, date, name, description FROM holidays WHERE date BETWEEN ? AND ? ORDER BY date",
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to list holidays"))?;

    Ok(HttpResponse::Ok().json(holidays))
}

/// Declare a holiday (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday created", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = MessageResponse),
        (status = 409, description = "A holiday already exists on that date", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateHoliday>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(message(StatusCode::BAD_REQUEST, "Holiday name is required"));
    }

    let result = sqlx::query("INSERT INTO holidays (date, name, description) VALUES (?, ?, ?)")
        .bind(payload.date)
        .bind(name)
        .bind(payload.description.as_deref())
        .execute(pool.get_ref())
        .await;

    match result {
        Ok(_) => {
            info!(date = %payload.date, name, "Holiday created");
            Ok(message(StatusCode::CREATED, "Holiday created"))
        }
        Err(e) if is_duplicate_key(&e) => Ok(message(
            StatusCode::CONFLICT,
            "A holiday already exists on that date",
        )),
        Err(e) => Err(db_error(e, "Failed to create holiday")),
    }
}

/// Remove a holiday (HR/Admin)
#[utoipa::path(
    delete,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday deleted", body = MessageResponse),
        (status = 404, description = "Holiday not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let holiday_id = path.into_inner();

    let result = sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(holiday_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to delete holiday"))?;

    if result.rows_affected() == 0 {
        return Ok(message(StatusCode::NOT_FOUND, "Holiday not found"));
    }

    Ok(message(StatusCode::OK, "Holiday deleted"))
}
