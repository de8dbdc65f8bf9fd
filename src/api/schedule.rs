use crate::{
    api::{db_error, message, schedule_error},
    auth::auth::AuthUser,
    model::work_schedule::{Geofence, WorkSchedule, WorkScheduleResponse, WorkScheduleRow, format_work_days},
    models::MessageResponse,
    schedule::{
        ScheduleError, ScheduleStore,
        clock::{format_hhmm, parse_hhmm},
        repository::SCHEDULE_COLUMNS,
    },
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::ToSchema;

const MAX_GRACE_MINUTES: u32 = 120;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScheduleReq {
    #[schema(example = "Teaching staff")]
    pub name: String,
    #[schema(example = 2, nullable = true)]
    pub department_id: Option<u64>,
    #[schema(example = "09:00")]
    pub start_time: String,
    #[schema(example = "16:00")]
    pub end_time: String,
    #[schema(example = 10)]
    pub grace_minutes: u32,
    /// Weekday numbers, Monday = 1 ... Saturday = 6
    #[schema(example = json!([1, 2, 3, 4, 5, 6]))]
    pub work_days: Vec<u8>,
    #[schema(example = "09:00", nullable = true)]
    pub saturday_start_time: Option<String>,
    #[schema(example = "13:00", nullable = true)]
    pub saturday_end_time: Option<String>,
    #[schema(example = 15, nullable = true)]
    pub saturday_grace_minutes: Option<u32>,
    pub geofence: Option<Geofence>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_global: bool,
}

/// A request that passed validation, normalised for storage.
#[derive(Debug, PartialEq)]
struct ValidSchedule {
    name: String,
    department_id: Option<u64>,
    start_time: String,
    end_time: String,
    grace_minutes: u32,
    work_days: String,
    saturday_start_time: Option<String>,
    saturday_end_time: Option<String>,
    saturday_grace_minutes: Option<u32>,
    geofence: Option<Geofence>,
    is_default: bool,
    is_global: bool,
}

fn optional_time(value: Option<&str>, field: &str) -> Result<Option<String>, String> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => parse_hhmm(v)
            .map(|t| Some(format_hhmm(t)))
            .map_err(|_| format!("{field} must be HH:MM")),
    }
}

fn validate(req: &ScheduleReq) -> Result<ValidSchedule, String> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err("name is required".into());
    }

    let start = parse_hhmm(&req.start_time).map_err(|_| "start_time must be HH:MM".to_string())?;
    let end = parse_hhmm(&req.end_time).map_err(|_| "end_time must be HH:MM".to_string())?;
    if end <= start {
        return Err("end_time must be after start_time".into());
    }

    for grace in std::iter::once(req.grace_minutes).chain(req.saturday_grace_minutes) {
        if grace > MAX_GRACE_MINUTES {
            return Err(format!("grace minutes cannot exceed {MAX_GRACE_MINUTES}"));
        }
    }

    if req.work_days.is_empty() {
        return Err("at least one work day is required".into());
    }
    if let Some(day) = req.work_days.iter().find(|d| **d == 0 || **d > 6) {
        return Err(format!("invalid work day {day}, use 1 (Monday) to 6 (Saturday)"));
    }
    let mut days = req.work_days.clone();
    days.sort_unstable();
    days.dedup();

    let saturday_start_time = optional_time(req.saturday_start_time.as_deref(), "saturday_start_time")?;
    let saturday_end_time = optional_time(req.saturday_end_time.as_deref(), "saturday_end_time")?;
    if let (Some(s), Some(e)) = (&saturday_start_time, &saturday_end_time) {
        // HH:MM strings order the same way the times do
        if e <= s {
            return Err("saturday_end_time must be after saturday_start_time".into());
        }
    }

    if let Some(fence) = &req.geofence {
        let c = fence.center;
        if !(-90.0..=90.0).contains(&c.latitude) || !(-180.0..=180.0).contains(&c.longitude) {
            return Err("geofence center is not a valid coordinate".into());
        }
        if !(fence.radius_km > 0.0 && fence.radius_km.is_finite()) {
            return Err("geofence radius_km must be positive".into());
        }
    }

    if req.is_global && req.department_id.is_some() {
        return Err("a global schedule cannot belong to a department".into());
    }
    if !req.is_global && req.department_id.is_none() {
        return Err("department_id is required unless the schedule is global".into());
    }

    Ok(ValidSchedule {
        name: name.to_string(),
        department_id: req.department_id,
        start_time: format_hhmm(start),
        end_time: format_hhmm(end),
        grace_minutes: req.grace_minutes,
        work_days: format_work_days(&days),
        saturday_start_time,
        saturday_end_time,
        saturday_grace_minutes: req.saturday_grace_minutes,
        geofence: req.geofence,
        is_default: req.is_default,
        is_global: req.is_global,
    })
}

/// Only one global schedule may be the default at a time.
async fn clear_global_default(tx: &mut Transaction<'_, MySql>, keep: Option<u64>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE work_schedules SET is_default = FALSE WHERE is_global = TRUE AND id <> ?")
        .bind(keep.unwrap_or(0))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// List all work schedules (Admin)
#[utoipa::path(
    get,
    path = "/api/schedules",
    responses((status = 200, description = "All schedules", body = [WorkScheduleResponse])),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn list_schedules(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let rows = sqlx::query_as::<_, WorkScheduleRow>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM work_schedules ORDER BY id"
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to list schedules"))?;

    let schedules = rows
        .into_iter()
        .map(|row| WorkSchedule::try_from(row).map(|s| WorkScheduleResponse::from(&s)))
        .collect::<Result<Vec<_>, ScheduleError>>()
        .map_err(schedule_error)?;

    Ok(HttpResponse::Ok().json(schedules))
}

/// Create a work schedule (Admin)
#[utoipa::path(
    post,
    path = "/api/schedules",
    request_body = ScheduleReq,
    responses(
        (status = 201, description = "Schedule created", body = MessageResponse),
        (status = 400, description = "Validation failed", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn create_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schedules: web::Data<ScheduleStore>,
    payload: web::Json<ScheduleReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let s = match validate(&payload) {
        Ok(s) => s,
        Err(reason) => return Ok(message(StatusCode::BAD_REQUEST, reason)),
    };

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| db_error(e, "Failed to start transaction"))?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO work_schedules
            (name, department_id, start_time, end_time, grace_minutes, work_days,
             saturday_start_time, saturday_end_time, saturday_grace_minutes,
             latitude, longitude, location_radius_km, is_default, is_global)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&s.name)
    .bind(s.department_id)
    .bind(&s.start_time)
    .bind(&s.end_time)
    .bind(s.grace_minutes)
    .bind(&s.work_days)
    .bind(&s.saturday_start_time)
    .bind(&s.saturday_end_time)
    .bind(s.saturday_grace_minutes)
    .bind(s.geofence.map(|f| f.center.latitude))
    .bind(s.geofence.map(|f| f.center.longitude))
    .bind(s.geofence.map(|f| f.radius_km))
    .bind(s.is_default)
    .bind(s.is_global)
    .execute(&mut *tx)
    .await
    .map_err(|e| db_error(e, "Failed to create schedule"))?;

    let id = inserted.last_insert_id();
    if s.is_global && s.is_default {
        clear_global_default(&mut tx, Some(id))
            .await
            .map_err(|e| db_error(e, "Failed to reset global default"))?;
    }

    tx.commit()
        .await
        .map_err(|e| db_error(e, "Failed to commit schedule"))?;
    schedules.invalidate();

    info!(schedule_id = id, name = %s.name, "Work schedule created");
    Ok(message(StatusCode::CREATED, "Schedule created"))
}

/// Replace a work schedule (Admin)
#[utoipa::path(
    put,
    path = "/api/schedules/{schedule_id}",
    params(("schedule_id" = u64, Path, description = "Schedule ID")),
    request_body = ScheduleReq,
    responses(
        (status = 200, description = "Schedule updated", body = MessageResponse),
        (status = 400, description = "Validation failed", body = MessageResponse),
        (status = 404, description = "Schedule not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn update_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schedules: web::Data<ScheduleStore>,
    path: web::Path<u64>,
    payload: web::Json<ScheduleReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let schedule_id = path.into_inner();

    let s = match validate(&payload) {
        Ok(s) => s,
        Err(reason) => return Ok(message(StatusCode::BAD_REQUEST, reason)),
    };

    let exists = sqlx::query_scalar::<_, u64>("SELECT id FROM work_schedules WHERE id = ?")
        .bind(schedule_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch schedule"))?;
    if exists.is_none() {
        return Ok(message(StatusCode::NOT_FOUND, "Schedule not found"));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| db_error(e, "Failed to start transaction"))?;

    sqlx::query(
        r#"
        UPDATE work_schedules
        SET name = ?, department_id = ?, start_time = ?, end_time = ?, grace_minutes = ?,
            work_days = ?, saturday_start_time = ?, saturday_end_time = ?,
            saturday_grace_minutes = ?, latitude = ?, longitude = ?,
            location_radius_km = ?, is_default = ?, is_global = ?
        WHERE id = ?
        "#,
    )
    .bind(&s.name)
    .bind(s.department_id)
    .bind(&s.start_time)
    .bind(&s.end_time)
    .bind(s.grace_minutes)
    .bind(&s.work_days)
    .bind(&s.saturday_start_time)
    .bind(&s.saturday_end_time)
    .bind(s.saturday_grace_minutes)
    .bind(s.geofence.map(|f| f.center.latitude))
    .bind(s.geofence.map(|f| f.center.longitude))
    .bind(s.geofence.map(|f| f.radius_km))
    .bind(s.is_default)
    .bind(s.is_global)
    .bind(schedule_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| db_error(e, "Failed to update schedule"))?;

    if s.is_global && s.is_default {
        clear_global_default(&mut tx, Some(schedule_id))
            .await
            .map_err(|e| db_error(e, "Failed to reset global default"))?;
    }

    tx.commit()
        .await
        .map_err(|e| db_error(e, "Failed to commit schedule"))?;
    schedules.invalidate();

    info!(schedule_id, "Work schedule updated");
    Ok(message(StatusCode::OK, "Schedule updated"))
}

/// Delete a work schedule (Admin)
#[utoipa::path(
    delete,
    path = "/api/schedules/{schedule_id}",
    params(("schedule_id" = u64, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule deleted", body = MessageResponse),
        (status = 404, description = "Schedule not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Schedule"
)]
pub async fn delete_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schedules: web::Data<ScheduleStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let schedule_id = path.into_inner();

    let result = sqlx::query("DELETE FROM work_schedules WHERE id = ?")
        .bind(schedule_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to delete schedule"))?;

    if result.rows_affected() == 0 {
        return Ok(message(StatusCode::NOT_FOUND, "Schedule not found"));
    }
    schedules.invalidate();

    info!(schedule_id, "Work schedule deleted");
    Ok(message(StatusCode::OK, "Schedule deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;

    fn req() -> ScheduleReq {
        ScheduleReq {
            name: " Teaching staff ".into(),
            department_id: Some(2),
            start_time: "09:00".into(),
            end_time: "16:00:00".into(),
            grace_minutes: 10,
            work_days: vec![6, 1, 2, 3, 4, 5, 1],
            saturday_start_time: Some("09:00".into()),
            saturday_end_time: Some("13:00".into()),
            saturday_grace_minutes: Some(15),
            geofence: Some(Geofence {
                center: GeoPoint {
                    latitude: 23.0225,
                    longitude: 72.5714,
                },
                radius_km: 0.2,
            }),
            is_default: false,
            is_global: false,
        }
    }

    #[test]
    fn normalises_a_valid_request() {
        let s = validate(&req()).unwrap();
        assert_eq!(s.name, "Teaching staff");
        assert_eq!(s.start_time, "09:00");
        assert_eq!(s.end_time, "16:00");
        assert_eq!(s.work_days, "1,2,3,4,5,6");
        assert_eq!(s.saturday_end_time.as_deref(), Some("13:00"));
    }

    #[test]
    fn rejects_inverted_hours() {
        let mut r = req();
        r.end_time = "08:00".into();
        assert!(validate(&r).unwrap_err().contains("end_time"));

        let mut r = req();
        r.saturday_end_time = Some("08:30".into());
        assert!(validate(&r).unwrap_err().contains("saturday_end_time"));
    }

    #[test]
    fn rejects_sunday_and_empty_work_days() {
        let mut r = req();
        r.work_days = vec![0, 1];
        assert!(validate(&r).is_err());

        r.work_days.clear();
        assert!(validate(&r).is_err());
    }

    #[test]
    fn rejects_bad_grace_and_geofence() {
        let mut r = req();
        r.saturday_grace_minutes = Some(500);
        assert!(validate(&r).is_err());

        let mut r = req();
        r.geofence = r.geofence.map(|f| Geofence { radius_km: 0.0, ..f });
        assert!(validate(&r).unwrap_err().contains("radius_km"));
    }

    #[test]
    fn global_schedules_have_no_department() {
        let mut r = req();
        r.is_global = true;
        assert!(validate(&r).is_err());

        r.department_id = None;
        assert!(validate(&r).is_ok());

        r.is_global = false;
        assert!(validate(&r).is_err());
    }
}
