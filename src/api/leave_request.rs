use crate::{
    api::{db_error, holiday, message, paging},
    auth::auth::AuthUser,
    model::leave_request::{ApplicantKind, LEAVE_COLUMNS, LeaveRequest, LeaveStatus, LeaveType},
    models::MessageResponse,
    schedule::AttendanceStatus,
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

/// Longest single request, in calendar days.
const MAX_LEAVE_DAYS: i64 = 60;

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[serde(default = "staff")]
    pub applicant_kind: ApplicantKind,
    /// Required for student leave
    #[schema(example = "Aarav Shah", nullable = true)]
    pub student_name: Option<String>,
    /// Required for student leave
    #[schema(example = "7-B", nullable = true)]
    pub class_name: Option<String>,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-06", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    pub leave_type: LeaveType,
    #[schema(example = "Fever", nullable = true)]
    pub reason: Option<String>,
}

fn staff() -> ApplicantKind {
    ApplicantKind::Staff
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID (HR/Admin)
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    /// pending, approved or rejected
    #[schema(example = "pending")]
    pub status: Option<String>,
    /// staff or student
    #[schema(example = "student")]
    pub applicant_kind: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 10)]
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

/// Student leave may also be decided by teachers; staff leave only by HR/Admin.
fn may_decide(auth: &AuthUser, kind: ApplicantKind) -> bool {
    match kind {
        ApplicantKind::Staff => auth.is_hr_or_admin(),
        ApplicantKind::Student => auth.is_hr_or_admin() || auth.is_teacher(),
    }
}

fn validate_leave(auth: &AuthUser, payload: &CreateLeave) -> Result<(), String> {
    if payload.start_date > payload.end_date {
        return Err("start_date cannot be after end_date".into());
    }
    if (payload.end_date - payload.start_date).num_days() >= MAX_LEAVE_DAYS {
        return Err(format!("A single request cannot exceed {MAX_LEAVE_DAYS} days"));
    }

    if payload.applicant_kind == ApplicantKind::Student {
        if !(auth.is_teacher() || auth.is_hr_or_admin()) {
            return Err("Only teachers can file student leave".into());
        }
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !filled(&payload.student_name) || !filled(&payload.class_name) {
            return Err("student_name and class_name are required for student leave".into());
        }
    }

    Ok(())
}

/// Days of a staff leave that get an `ON_LEAVE` attendance mark.
pub(crate) fn covered_days(start: NaiveDate, end: NaiveDate, holidays: &[NaiveDate]) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| d.weekday() != Weekday::Sun && !holidays.contains(d))
        .collect()
}

pub(crate) async fn on_approved_leave(
    pool: &MySqlPool,
    employee_id: u64,
    date: NaiveDate,
) -> actix_web::Result<bool> {
    let found = sqlx::query_scalar::<_, u64>(
        r#"
        SELECT id FROM leave_requests
        WHERE employee_id = ?
        AND applicant_kind = 'staff'
        AND status = 'approved'
        AND ? BETWEEN start_date AND end_date
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool)
    .await
    .map_err(|e| db_error(e, "Failed to check approved leave"))?;

    Ok(found.is_some())
}

async fn fetch_leave(pool: &MySqlPool, leave_id: u64) -> actix_web::Result<Option<LeaveRequest>> {
    sqlx::query_as::<_, LeaveRequest>(&format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?"
    ))
    .bind(leave_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch leave request"))
}

/// Apply for leave
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(content = CreateLeave, description = "Leave request payload", content_type = "application/json"),
    responses(
        (status = 201, description = "Leave request submitted", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 409, description = "Overlaps an existing request", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee()?;

    if let Err(reason) = validate_leave(&auth, &payload) {
        return Ok(message(StatusCode::BAD_REQUEST, reason));
    }

    if payload.applicant_kind == ApplicantKind::Staff {
        let overlapping = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM leave_requests
            WHERE employee_id = ?
            AND applicant_kind = 'staff'
            AND status IN ('pending', 'approved')
            AND start_date <= ? AND end_date >= ?
            "#,
        )
        .bind(employee_id)
        .bind(payload.end_date)
        .bind(payload.start_date)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to check overlapping leave"))?;

        if overlapping > 0 {
            return Ok(message(
                StatusCode::CONFLICT,
                "You already have leave requested for some of these days",
            ));
        }
    }

    sqlx::query(
        r#"
        INSERT INTO leave_requests
            (applicant_kind, employee_id, student_name, class_name, start_date, end_date, leave_type, reason, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.applicant_kind.as_ref())
    .bind(employee_id)
    .bind(payload.student_name.as_deref().map(str::trim))
    .bind(payload.class_name.as_deref().map(str::trim))
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.as_ref())
    .bind(payload.reason.as_deref())
    .bind(LeaveStatus::Pending.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to create leave request"))?;

    info!(employee_id, kind = %payload.applicant_kind, "Leave request submitted");
    Ok(message(StatusCode::CREATED, "Leave request submitted"))
}

async fn decide(
    auth: &AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    decision: LeaveStatus,
) -> actix_web::Result<HttpResponse> {
    let Some(leave) = fetch_leave(pool, leave_id).await? else {
        return Ok(message(StatusCode::NOT_FOUND, "Leave request not found"));
    };
    let Some(kind) = leave.kind() else {
        return Err(actix_web::error::ErrorInternalServerError("Internal Server Error"));
    };
    if !may_decide(auth, kind) {
        return Err(actix_web::error::ErrorForbidden("Not allowed to decide this leave"));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| db_error(e, "Failed to start transaction"))?;

    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, decided_by = ?
        WHERE id = ?
        AND status = 'pending'
        "#,
    )
    .bind(decision.as_ref())
    .bind(auth.user_id)
    .bind(leave_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| db_error(e, "Failed to update leave status"))?;

    if result.rows_affected() == 0 {
        return Ok(message(StatusCode::BAD_REQUEST, "Leave request already processed"));
    }

    if decision == LeaveStatus::Approved && kind == ApplicantKind::Staff {
        let holidays = holiday::holidays_between(pool, leave.start_date, leave.end_date).await?;
        let days = covered_days(leave.start_date, leave.end_date, &holidays);

        for day in &days {
            // A day already worked keeps its check-in status.
            sqlx::query(
                r#"
                INSERT INTO attendance (employee_id, date, status)
                VALUES (?, ?, ?)
                ON DUPLICATE KEY UPDATE status = IF(check_in IS NULL, VALUES(status), status)
                "#,
            )
            .bind(leave.employee_id)
            .bind(day)
            .bind(AttendanceStatus::OnLeave.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error(e, "Failed to mark leave days"))?;
        }
        info!(leave_id, employee_id = leave.employee_id, days = days.len(), "Marked leave days");
    }

    tx.commit()
        .await
        .map_err(|e| db_error(e, "Failed to commit leave decision"))?;

    info!(leave_id, decision = %decision, decided_by = auth.user_id, "Leave decided");
    Ok(message(StatusCode::OK, format!("Leave {decision}")))
}

/// Approve a pending leave
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = MessageResponse),
        (status = 400, description = "Already processed", body = MessageResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Approved).await
}

/// Reject a pending leave
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = MessageResponse),
        (status = 400, description = "Already processed", body = MessageResponse),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Rejected).await
}

/// Leave request details
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    match fetch_leave(pool.get_ref(), leave_id).await? {
        Some(leave) if auth.is_hr_or_admin() || auth.employee_id == Some(leave.employee_id) => {
            Ok(HttpResponse::Ok().json(leave))
        }
        Some(_) => Err(actix_web::error::ErrorForbidden("Not your leave request")),
        None => Ok(message(StatusCode::NOT_FOUND, "Leave request not found")),
    }
}

/// Leave requests, paginated. Non-HR users only see what they filed.
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses((status = 200, description = "Paginated leave list", body = LeaveListResponse)),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let (page, per_page, offset) = paging(query.page, query.per_page);

    let employee_filter = if auth.is_hr_or_admin() {
        query.employee_id
    } else {
        Some(auth.require_employee()?)
    };

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = employee_filter {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }
    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }
    if let Some(kind) = query.applicant_kind.as_deref() {
        where_sql.push_str(" AND applicant_kind = ?");
        args.push(FilterValue::Str(kind));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }
    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to count leave requests"))?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_sql} ORDER BY created_at DESC LIMIT ? OFFSET ?"
    );
    let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }
    let leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch leave list"))?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "someone".into(),
            role,
            employee_id: Some(10),
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn request(kind: ApplicantKind) -> CreateLeave {
        CreateLeave {
            applicant_kind: kind,
            student_name: None,
            class_name: None,
            start_date: d(2),
            end_date: d(4),
            leave_type: LeaveType::Sick,
            reason: None,
        }
    }

    #[test]
    fn decision_rights_depend_on_applicant() {
        assert!(may_decide(&user(Role::Hr), ApplicantKind::Staff));
        assert!(!may_decide(&user(Role::Teacher), ApplicantKind::Staff));
        assert!(may_decide(&user(Role::Teacher), ApplicantKind::Student));
        assert!(!may_decide(&user(Role::Staff), ApplicantKind::Student));
    }

    #[test]
    fn student_leave_needs_a_teacher_and_names() {
        let mut req = request(ApplicantKind::Student);
        assert!(validate_leave(&user(Role::Teacher), &req).is_err());

        req.student_name = Some("Aarav".into());
        req.class_name = Some("7-B".into());
        assert!(validate_leave(&user(Role::Teacher), &req).is_ok());
        assert!(validate_leave(&user(Role::Staff), &req).is_err());
    }

    #[test]
    fn rejects_inverted_or_huge_ranges() {
        let mut req = request(ApplicantKind::Staff);
        req.start_date = d(5);
        assert!(validate_leave(&user(Role::Staff), &req).is_err());

        req.start_date = d(1);
        req.end_date = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert!(validate_leave(&user(Role::Staff), &req).is_err());
    }

    #[test]
    fn covered_days_skip_sundays_and_holidays() {
        // 2026-03-06 Fri .. 2026-03-10 Tue, Sunday the 8th, holiday on the 9th
        let days = covered_days(d(6), d(10), &[d(9)]);
        assert_eq!(days, vec![d(6), d(7), d(10)]);
    }

    #[test]
    fn applicant_kind_defaults_to_staff() {
        let req: CreateLeave = serde_json::from_str(
            r#"{"start_date":"2026-03-02","end_date":"2026-03-02","leave_type":"casual"}"#,
        )
        .unwrap();
        assert_eq!(req.applicant_kind, ApplicantKind::Staff);
    }
}
