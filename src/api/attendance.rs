use crate::{
    api::{db_error, holiday, is_duplicate_key, leave_request, message, schedule_error},
    auth::auth::AuthUser,
    config::Config,
    geo::{AcquisitionConfig, GeoPoint, LocationReading, LocationResult, settle_samples},
    model::{
        attendance::{ATTENDANCE_COLUMNS, Attendance},
        work_schedule::{Geofence, WorkSchedule},
    },
    models::MessageResponse,
    report::{AttendanceSummary, expected_working_days, summarize},
    schedule::{
        AttendanceStatus, ScheduleStore, assess_check_in, assess_check_out,
        clock::{self, parse_month},
        resolve_schedule,
    },
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::{Datelike, NaiveDate, Utc};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};

/// Position the client settled on before checking in.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct LocationFix {
    #[schema(example = 23.0225)]
    pub latitude: f64,
    #[schema(example = 72.5714)]
    pub longitude: f64,
    /// Error radius in meters
    #[schema(example = 18.5)]
    pub accuracy: f64,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckInReq {
    /// Reference to the uploaded selfie
    #[schema(example = "uploads/attendance/2026/03/02/14.jpg")]
    pub photo_ref: String,
    pub location: Option<LocationFix>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutReq {
    pub location: Option<LocationFix>,
}

#[derive(Deserialize, ToSchema)]
pub struct LocateReq {
    /// Samples in the order the device produced them
    pub samples: Vec<LocationFix>,
}

#[derive(Serialize, ToSchema)]
pub struct LocateResponse {
    pub location: LocationResult,
    /// `None` when the schedule has no geofence
    pub inside_geofence: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct CheckInResponse {
    #[schema(example = "Checked in successfully")]
    pub message: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[schema(example = 7)]
    pub late_minutes: u32,
}

#[derive(Serialize, ToSchema)]
pub struct CheckOutResponse {
    #[schema(example = "Checked out successfully")]
    pub message: String,
    pub early_minutes: u32,
    pub overtime_minutes: u32,
    pub worked_minutes: u32,
}

#[derive(Deserialize, IntoParams)]
pub struct MonthQuery {
    /// `YYYY-MM`, defaults to the current month
    pub month: Option<String>,
    /// HR/Admin only; defaults to the caller
    pub employee_id: Option<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct DayQuery {
    /// `YYYY-MM-DD`, defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceSummaryResponse {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to: NaiveDate,
    pub working_days: u32,
    pub present_days: u32,
    pub late_days: u32,
    pub absent_days: u32,
    pub leave_days: u32,
    pub late_minutes: u64,
    pub early_minutes: u64,
}

#[derive(Debug, PartialEq)]
pub(crate) enum LocationRejection {
    Missing,
    Inaccurate { accuracy: f64, required: f64 },
    OutsideGeofence { distance_km: f64, radius_km: f64 },
}

impl LocationRejection {
    fn message(&self) -> String {
        match self {
            LocationRejection::Missing => "Location is required to check in here".to_string(),
            LocationRejection::Inaccurate { accuracy, required } => format!(
                "Location accuracy {accuracy:.0} m is worse than the required {required:.0} m, please retry"
            ),
            LocationRejection::OutsideGeofence {
                distance_km,
                radius_km,
            } => format!(
                "You are {distance_km:.2} km from school, outside the allowed {radius_km:.2} km"
            ),
        }
    }
}

/// Without a geofence any (or no) location is accepted.
pub(crate) fn check_location(
    geofence: Option<&Geofence>,
    fix: Option<&LocationFix>,
    required_accuracy_m: f64,
) -> Result<(), LocationRejection> {
    let Some(fence) = geofence else {
        return Ok(());
    };
    let fix = fix.ok_or(LocationRejection::Missing)?;

    if fix.accuracy > required_accuracy_m {
        return Err(LocationRejection::Inaccurate {
            accuracy: fix.accuracy,
            required: required_accuracy_m,
        });
    }

    let point = GeoPoint {
        latitude: fix.latitude,
        longitude: fix.longitude,
    };
    if !fence.contains(point) {
        return Err(LocationRejection::OutsideGeofence {
            distance_km: crate::geo::distance_km(fence.center, point),
            radius_km: fence.radius_km,
        });
    }

    Ok(())
}

/// The department of a known employee; an unknown one gets a 404 response.
fn known_employee(found: Option<Option<u64>>) -> Result<Option<u64>, HttpResponse> {
    found.ok_or_else(|| message(StatusCode::NOT_FOUND, "Employee not found"))
}

/// `Some(department_id)` for a known employee, `None` when no such employee.
pub(crate) async fn employee_department(
    pool: &MySqlPool,
    employee_id: u64,
) -> actix_web::Result<Option<Option<u64>>> {
    sqlx::query_scalar::<_, Option<u64>>("SELECT department_id FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| db_error(e, "Failed to fetch employee department"))
}

async fn today_row(pool: &MySqlPool, employee_id: u64, date: NaiveDate) -> actix_web::Result<Option<Attendance>> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date = ?"
    ))
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch attendance"))
}

pub(crate) async fn attendance_between(
    pool: &MySqlPool,
    employee_id: u64,
    from: NaiveDate,
    to: NaiveDate,
) -> actix_web::Result<Vec<Attendance>> {
    sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE employee_id = ? AND date BETWEEN ? AND ? ORDER BY date"
    ))
    .bind(employee_id)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch attendance range"))
}

pub(crate) struct PeriodAttendance {
    pub summary: AttendanceSummary,
    pub working_days: u32,
}

/// Attendance of one employee over `from..=to` under `schedule`, with days
/// after `as_of` not yet counted as missed.
pub(crate) async fn employee_period(
    pool: &MySqlPool,
    schedule: &WorkSchedule,
    employee_id: u64,
    holidays: &[NaiveDate],
    (from, to): (NaiveDate, NaiveDate),
    as_of: NaiveDate,
) -> actix_web::Result<PeriodAttendance> {
    let rows = attendance_between(pool, employee_id, from, to).await?;
    let records: Vec<_> = rows
        .iter()
        .filter_map(|row| {
            let record = row.day_record();
            if record.is_none() {
                warn!(attendance_id = row.id, status = %row.status, "Skipping row with unknown status");
            }
            record
        })
        .collect();

    let expected = if as_of < from {
        Vec::new()
    } else {
        expected_working_days(from, to.min(as_of), schedule, holidays)
    };

    Ok(PeriodAttendance {
        summary: summarize(&records, &expected),
        working_days: expected.len() as u32,
    })
}

/// Settle a batch of location samples before checking in
#[utoipa::path(
    post,
    path = "/api/attendance/locate",
    request_body = LocateReq,
    responses(
        (status = 200, description = "Best usable position", body = LocateResponse),
        (status = 404, description = "Employee not found", body = MessageResponse),
        (status = 422, description = "No usable position", body = MessageResponse),
        (status = 409, description = "No work schedule configured", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn locate(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    schedules: web::Data<ScheduleStore>,
    payload: web::Json<LocateReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    let department_id = match known_employee(employee_department(pool.get_ref(), employee_id).await?) {
        Ok(department_id) => department_id,
        Err(not_found) => return Ok(not_found),
    };
    let schedule = resolve_schedule(schedules.get_ref(), department_id)
        .await
        .map_err(schedule_error)?;

    let now = Utc::now();
    let samples: Vec<LocationReading> = payload
        .samples
        .iter()
        .map(|fix| LocationReading {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            timestamp: now,
        })
        .collect();

    let acquisition = AcquisitionConfig {
        required_accuracy_m: config.required_accuracy_m,
        max_duration: Duration::from_millis(config.location_max_duration_ms),
        target: schedule.geofence.map(|f| f.center),
        ..Default::default()
    };

    match settle_samples(&samples, acquisition).await {
        Ok(location) => {
            let inside_geofence = schedule.geofence.map(|fence| {
                fence.contains(GeoPoint {
                    latitude: location.latitude,
                    longitude: location.longitude,
                })
            });
            Ok(HttpResponse::Ok().json(LocateResponse {
                location,
                inside_geofence,
            }))
        }
        Err(e) => {
            info!(employee_id, error = %e, samples = samples.len(), "No usable location");
            Ok(message(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
    }
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInReq,
    responses(
        (status = 200, description = "Checked in", body = CheckInResponse),
        (status = 400, description = "Already checked in, holiday, on leave or bad location", body = MessageResponse),
        (status = 403, description = "Outside the school geofence", body = MessageResponse),
        (status = 409, description = "No work schedule configured", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
#[instrument(name = "attendance_check_in", skip_all, fields(user_id = auth.user_id))]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    schedules: web::Data<ScheduleStore>,
    payload: web::Json<CheckInReq>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    if payload.photo_ref.trim().is_empty() {
        return Ok(message(StatusCode::BAD_REQUEST, "A check-in photo is required"));
    }

    let now = Utc::now();
    let local = clock::to_ist(now);
    let today = local.date();

    let department_id = match known_employee(employee_department(pool.get_ref(), employee_id).await?) {
        Ok(department_id) => department_id,
        Err(not_found) => return Ok(not_found),
    };

    if let Some(name) = holiday::holiday_on(pool.get_ref(), today).await? {
        return Ok(message(StatusCode::BAD_REQUEST, format!("Today is a holiday: {name}")));
    }

    if leave_request::on_approved_leave(pool.get_ref(), employee_id, today).await? {
        return Ok(message(StatusCode::BAD_REQUEST, "You are on approved leave today"));
    }

    let schedule = resolve_schedule(schedules.get_ref(), department_id)
        .await
        .map_err(schedule_error)?;

    if let Err(rejection) = check_location(
        schedule.geofence.as_ref(),
        payload.location.as_ref(),
        config.required_accuracy_m,
    ) {
        info!(employee_id, ?rejection, "Check-in location rejected");
        let status = match rejection {
            LocationRejection::OutsideGeofence { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        };
        return Ok(message(status, rejection.message()));
    }

    let assessment = assess_check_in(local, &schedule);

    let result = sqlx::query(
        r#"
        INSERT INTO attendance
            (employee_id, date, check_in, status, late_minutes, photo_ref, latitude, longitude, accuracy)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(today)
    .bind(now)
    .bind(assessment.status.to_string())
    .bind(assessment.late_minutes)
    .bind(payload.photo_ref.trim())
    .bind(payload.location.map(|l| l.latitude))
    .bind(payload.location.map(|l| l.longitude))
    .bind(payload.location.map(|l| l.accuracy))
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(
                employee_id,
                status = %assessment.status,
                late_minutes = assessment.late_minutes,
                "Checked in"
            );
            Ok(HttpResponse::Ok().json(CheckInResponse {
                message: "Checked in successfully".to_string(),
                date: today,
                status: assessment.status,
                late_minutes: assessment.late_minutes,
            }))
        }
        Err(e) if is_duplicate_key(&e) => {
            Ok(message(StatusCode::BAD_REQUEST, "Already checked in today"))
        }
        Err(e) => Err(db_error(e, "Check-in failed")),
    }
}

/// Check-out endpoint
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    request_body = CheckOutReq,
    responses(
        (status = 200, description = "Checked out", body = CheckOutResponse),
        (status = 400, description = "No open check-in for today", body = MessageResponse),
        (status = 409, description = "No work schedule configured", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    schedules: web::Data<ScheduleStore>,
    payload: Option<web::Json<CheckOutReq>>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    let now = Utc::now();
    let local = clock::to_ist(now);

    let row = match today_row(pool.get_ref(), employee_id, local.date()).await? {
        Some(row) if row.check_out.is_none() => row,
        Some(_) => return Ok(message(StatusCode::BAD_REQUEST, "Already checked out today")),
        None => return Ok(message(StatusCode::BAD_REQUEST, "No active check-in found for today")),
    };

    let department_id = employee_department(pool.get_ref(), employee_id)
        .await?
        .flatten();
    let schedule = resolve_schedule(schedules.get_ref(), department_id)
        .await
        .map_err(schedule_error)?;

    let fix = payload.as_ref().and_then(|p| p.location);
    if let Err(rejection) = check_location(schedule.geofence.as_ref(), fix.as_ref(), config.required_accuracy_m) {
        info!(employee_id, ?rejection, "Check-out location rejected");
        return Ok(message(StatusCode::BAD_REQUEST, rejection.message()));
    }

    let out = assess_check_out(row.check_in.map(clock::to_ist), local, &schedule);

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?, early_minutes = ?, overtime_minutes = ?
        WHERE id = ?
        AND check_out IS NULL
        "#,
    )
    .bind(now)
    .bind(out.early_minutes)
    .bind(out.overtime_minutes)
    .bind(row.id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Check-out failed"))?;

    // Lost a race with a parallel check-out.
    if result.rows_affected() == 0 {
        return Ok(message(StatusCode::BAD_REQUEST, "Already checked out today"));
    }

    info!(employee_id, early_minutes = out.early_minutes, overtime_minutes = out.overtime_minutes, "Checked out");

    Ok(HttpResponse::Ok().json(CheckOutResponse {
        message: "Checked out successfully".to_string(),
        early_minutes: out.early_minutes,
        overtime_minutes: out.overtime_minutes,
        worked_minutes: out.worked_minutes,
    }))
}

fn resolve_month(month: Option<&str>) -> Option<(NaiveDate, NaiveDate)> {
    match month {
        Some(m) => parse_month(m),
        None => {
            let today = clock::ist_date(Utc::now());
            clock::month_bounds(today.year(), today.month())
        }
    }
}

/// Whose attendance a request may look at.
fn target_employee(auth: &AuthUser, requested: Option<u64>) -> actix_web::Result<u64> {
    match requested {
        Some(id) if Some(id) != auth.employee_id => {
            auth.require_hr_or_admin()?;
            Ok(id)
        }
        _ => auth.require_employee(),
    }
}

/// Attendance rows for one month
#[utoipa::path(
    get,
    path = "/api/attendance/me",
    params(MonthQuery),
    responses(
        (status = 200, description = "Attendance rows", body = [Attendance]),
        (status = 400, description = "Invalid month", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = target_employee(&auth, query.employee_id)?;
    let Some((from, to)) = resolve_month(query.month.as_deref()) else {
        return Ok(message(StatusCode::BAD_REQUEST, "month must look like YYYY-MM"));
    };

    let rows = attendance_between(pool.get_ref(), employee_id, from, to).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Everyone's attendance on one day (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/attendance/daily",
    params(DayQuery),
    responses((status = 200, description = "Attendance rows", body = [Attendance])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn daily_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DayQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let date = query.date.unwrap_or_else(|| clock::ist_date(Utc::now()));
    let rows = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE date = ? ORDER BY check_in"
    ))
    .bind(date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to fetch daily attendance"))?;

    Ok(HttpResponse::Ok().json(rows))
}

/// Monthly totals for one employee
#[utoipa::path(
    get,
    path = "/api/attendance/summary",
    params(MonthQuery),
    responses(
        (status = 200, description = "Summary", body = AttendanceSummaryResponse),
        (status = 400, description = "Invalid month", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn attendance_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schedules: web::Data<ScheduleStore>,
    query: web::Query<MonthQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = target_employee(&auth, query.employee_id)?;
    let Some((from, to)) = resolve_month(query.month.as_deref()) else {
        return Ok(message(StatusCode::BAD_REQUEST, "month must look like YYYY-MM"));
    };

    let department_id = match known_employee(employee_department(pool.get_ref(), employee_id).await?) {
        Ok(department_id) => department_id,
        Err(not_found) => return Ok(not_found),
    };

    let schedule = resolve_schedule(schedules.get_ref(), department_id)
        .await
        .map_err(schedule_error)?;
    let holidays = holiday::holidays_between(pool.get_ref(), from, to).await?;
    let today = clock::ist_date(Utc::now());
    let period = employee_period(
        pool.get_ref(),
        &schedule,
        employee_id,
        &holidays,
        (from, to),
        today,
    )
    .await?;

    let s = period.summary;
    Ok(HttpResponse::Ok().json(AttendanceSummaryResponse {
        employee_id,
        from,
        to,
        working_days: period.working_days,
        present_days: s.present_days,
        late_days: s.late_days,
        absent_days: s.absent_days,
        leave_days: s.leave_days,
        late_minutes: s.late_minutes,
        early_minutes: s.early_minutes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence() -> Geofence {
        Geofence {
            center: GeoPoint {
                latitude: 23.0225,
                longitude: 72.5714,
            },
            radius_km: 0.2,
        }
    }

    fn fix(latitude: f64, accuracy: f64) -> LocationFix {
        LocationFix {
            latitude,
            longitude: 72.5714,
            accuracy,
        }
    }

    #[test]
    fn no_geofence_accepts_anything() {
        assert_eq!(check_location(None, None, 80.0), Ok(()));
        assert_eq!(check_location(None, Some(&fix(0.0, 5000.0)), 80.0), Ok(()));
    }

    #[test]
    fn geofence_requires_a_location() {
        assert_eq!(
            check_location(Some(&fence()), None, 80.0),
            Err(LocationRejection::Missing)
        );
    }

    #[test]
    fn inaccurate_fix_is_rejected_before_distance() {
        let err = check_location(Some(&fence()), Some(&fix(23.0225, 95.0)), 80.0).unwrap_err();
        assert!(matches!(err, LocationRejection::Inaccurate { .. }));
    }

    #[test]
    fn accepts_inside_and_rejects_outside() {
        assert_eq!(check_location(Some(&fence()), Some(&fix(23.0235, 20.0)), 80.0), Ok(()));

        let err = check_location(Some(&fence()), Some(&fix(23.0255, 20.0)), 80.0).unwrap_err();
        match err {
            LocationRejection::OutsideGeofence { distance_km, radius_km } => {
                assert!(distance_km > 0.3 && distance_km < 0.35);
                assert_eq!(radius_km, 0.2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_employee_is_not_found() {
        let resp = known_employee(None).unwrap_err();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        assert_eq!(known_employee(Some(None)).unwrap(), None);
        assert_eq!(known_employee(Some(Some(3))).unwrap(), Some(3));
    }

    #[test]
    fn rejection_messages_are_readable() {
        let msg = LocationRejection::Inaccurate {
            accuracy: 120.4,
            required: 80.0,
        }
        .message();
        assert!(msg.contains("120 m"));
        assert!(msg.contains("80 m"));
    }
}
