use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{attendance::employee_period, db_error, holiday, message, paging, schedule_error},
    auth::auth::AuthUser,
    model::{
        employee::{EMPLOYEE_COLUMNS, Employee},
        payroll::{PAYROLL_COLUMNS, Payroll},
    },
    models::MessageResponse,
    report::salary::{SalaryBreakdown, SalaryInput, counted_sundays, net_salary, salary_breakdown},
    schedule::{ScheduleError, ScheduleStore, clock, resolve_schedule},
};

#[derive(Deserialize, ToSchema)]
pub struct GeneratePayroll {
    #[schema(example = "2026-03")]
    pub month: String,
    /// Only this employee; all active employees when omitted
    #[schema(example = 14, nullable = true)]
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct GeneratedPayroll {
    pub employee_id: u64,
    pub net_salary: f64,
}

#[derive(Serialize, ToSchema)]
pub struct GeneratePayrollResponse {
    #[schema(example = "2026-03")]
    pub month: String,
    pub generated: Vec<GeneratedPayroll>,
    /// Employees without a usable work schedule
    pub skipped: Vec<u64>,
}

#[derive(Deserialize, IntoParams)]
pub struct ReportQuery {
    /// Defaults to the caller's own record
    pub employee_id: Option<u64>,
    /// `YYYY-MM`
    pub month: String,
}

#[derive(Serialize, ToSchema)]
pub struct SalaryReport {
    pub employee_id: u64,
    #[schema(example = "Meera Patel")]
    pub employee_name: String,
    #[schema(example = "2026-03")]
    pub month: String,
    pub base_salary: f64,
    pub breakdown: SalaryBreakdown,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 1000.0)]
    pub bonus: Option<f64>,
    #[schema(example = 500.0)]
    pub deductions: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
pub struct PayrollQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// `YYYY-MM`
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedPayrollResponse {
    pub data: Vec<Payroll>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

/// Parses `YYYY-MM` and works out up to which day attendance counts.
fn payroll_period(month: &str, today: NaiveDate) -> Option<((NaiveDate, NaiveDate), NaiveDate)> {
    let (from, to) = clock::parse_month(month)?;
    Some(((from, to), today.min(to)))
}

fn month_label(first: NaiveDate) -> String {
    first.format("%Y-%m").to_string()
}

async fn fetch_employee(pool: &MySqlPool, employee_id: u64) -> actix_web::Result<Option<Employee>> {
    sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch employee"))
}

/// Bonus and deductions already entered for a month survive regeneration.
async fn stored_adjustments(pool: &MySqlPool, employee_id: u64, month: NaiveDate) -> actix_web::Result<(f64, f64)> {
    let found = sqlx::query_as::<_, (f64, f64)>(
        "SELECT bonus, deductions FROM payroll WHERE employee_id = ? AND month = ?",
    )
    .bind(employee_id)
    .bind(month)
    .fetch_optional(pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch payroll adjustments"))?;

    Ok(found.unwrap_or((0.0, 0.0)))
}

async fn compute_breakdown(
    pool: &MySqlPool,
    schedules: &ScheduleStore,
    employee: &Employee,
    holidays: &[NaiveDate],
    (from, to): (NaiveDate, NaiveDate),
    as_of: NaiveDate,
) -> actix_web::Result<Result<SalaryBreakdown, ScheduleError>> {
    let schedule = match resolve_schedule(schedules, employee.department_id).await {
        Ok(schedule) => schedule,
        Err(e @ ScheduleError::NotFound(_)) => return Ok(Err(e)),
        Err(e) => return Err(schedule_error(e)),
    };

    let period = employee_period(pool, &schedule, employee.id, holidays, (from, to), as_of).await?;
    let (bonus, deductions) = stored_adjustments(pool, employee.id, from).await?;

    Ok(Ok(salary_breakdown(&SalaryInput {
        base_salary: employee.base_salary,
        year: from.year(),
        month: from.month(),
        summary: period.summary,
        counted_sundays: counted_sundays(from, to, as_of),
        bonus,
        deductions,
    })))
}

/// Compute and store monthly payroll (Admin)
#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayroll,
    responses(
        (status = 200, description = "Payroll generated", body = GeneratePayrollResponse),
        (status = 400, description = "Invalid month", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schedules: web::Data<ScheduleStore>,
    payload: web::Json<GeneratePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let today = clock::ist_date(Utc::now());
    let Some(((from, to), as_of)) = payroll_period(&payload.month, today) else {
        return Ok(message(StatusCode::BAD_REQUEST, "month must look like YYYY-MM"));
    };

    let employees = match payload.employee_id {
        Some(id) => match fetch_employee(pool.get_ref(), id).await? {
            Some(employee) => vec![employee],
            None => return Ok(message(StatusCode::NOT_FOUND, "Employee not found")),
        },
        None => sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE status = 'active' ORDER BY id"
        ))
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch employees"))?,
    };

    let holidays = holiday::holidays_between(pool.get_ref(), from, to).await?;
    let mut generated = Vec::with_capacity(employees.len());
    let mut skipped = Vec::new();

    for employee in &employees {
        let b = match compute_breakdown(pool.get_ref(), &schedules, employee, &holidays, (from, to), as_of).await? {
            Ok(b) => b,
            Err(e) => {
                warn!(employee_id = employee.id, error = %e, "Skipping payroll");
                skipped.push(employee.id);
                continue;
            }
        };

        sqlx::query(
            r#"
            INSERT INTO payroll
                (employee_id, month, base_salary, present_days, late_days, absent_days, leave_days,
                 hajar_divas, late_minutes, late_deduction, early_deduction, gross_salary,
                 bonus, deductions, net_salary)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                base_salary = VALUES(base_salary), present_days = VALUES(present_days),
                late_days = VALUES(late_days), absent_days = VALUES(absent_days),
                leave_days = VALUES(leave_days), hajar_divas = VALUES(hajar_divas),
                late_minutes = VALUES(late_minutes), late_deduction = VALUES(late_deduction),
                early_deduction = VALUES(early_deduction), gross_salary = VALUES(gross_salary),
                net_salary = VALUES(net_salary)
            "#,
        )
        .bind(employee.id)
        .bind(from)
        .bind(employee.base_salary)
        .bind(b.present_days)
        .bind(b.late_days)
        .bind(b.absent_days)
        .bind(b.leave_days)
        .bind(b.hajar_divas)
        .bind(b.late_minutes)
        .bind(b.late_deduction)
        .bind(b.early_deduction)
        .bind(b.gross_salary)
        .bind(b.bonus)
        .bind(b.deductions)
        .bind(b.net_salary)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to store payroll"))?;

        generated.push(GeneratedPayroll {
            employee_id: employee.id,
            net_salary: b.net_salary,
        });
    }

    info!(month = %payload.month, generated = generated.len(), skipped = skipped.len(), "Payroll generated");

    Ok(HttpResponse::Ok().json(GeneratePayrollResponse {
        month: month_label(from),
        generated,
        skipped,
    }))
}

/// Salary breakdown for one employee and month, computed on the fly
#[utoipa::path(
    get,
    path = "/api/payroll/report",
    params(ReportQuery),
    responses(
        (status = 200, description = "Salary breakdown", body = SalaryReport),
        (status = 400, description = "Invalid month", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse),
        (status = 409, description = "No work schedule configured", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn salary_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schedules: web::Data<ScheduleStore>,
    query: web::Query<ReportQuery>,
) -> actix_web::Result<impl Responder> {
    let employee_id = match query.employee_id {
        Some(id) if Some(id) != auth.employee_id => {
            auth.require_hr_or_admin()?;
            id
        }
        _ => auth.require_employee()?,
    };

    let today = clock::ist_date(Utc::now());
    let Some(((from, to), as_of)) = payroll_period(&query.month, today) else {
        return Ok(message(StatusCode::BAD_REQUEST, "month must look like YYYY-MM"));
    };

    let Some(employee) = fetch_employee(pool.get_ref(), employee_id).await? else {
        return Ok(message(StatusCode::NOT_FOUND, "Employee not found"));
    };

    let holidays = holiday::holidays_between(pool.get_ref(), from, to).await?;
    let breakdown = compute_breakdown(pool.get_ref(), &schedules, &employee, &holidays, (from, to), as_of)
        .await?
        .map_err(schedule_error)?;

    Ok(HttpResponse::Ok().json(SalaryReport {
        employee_id,
        employee_name: employee.full_name(),
        month: month_label(from),
        base_salary: employee.base_salary,
        breakdown,
    }))
}

/// Adjust bonus or deductions of a stored payroll (Admin)
#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Payroll updated", body = Payroll),
        (status = 400, description = "Negative amount", body = MessageResponse),
        (status = 404, description = "Payroll not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<UpdatePayroll>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let payroll_id = path.into_inner();

    if body.bonus.is_some_and(|v| v < 0.0) || body.deductions.is_some_and(|v| v < 0.0) {
        return Ok(message(StatusCode::BAD_REQUEST, "bonus and deductions cannot be negative"));
    }

    let Some(mut current) = fetch_payroll(pool.get_ref(), payroll_id).await? else {
        return Ok(message(StatusCode::NOT_FOUND, "Payroll record not found"));
    };

    current.bonus = body.bonus.unwrap_or(current.bonus);
    current.deductions = body.deductions.unwrap_or(current.deductions);
    current.net_salary = net_salary(
        current.gross_salary,
        current.late_deduction,
        current.early_deduction,
        current.bonus,
        current.deductions,
    );

    sqlx::query("UPDATE payroll SET bonus = ?, deductions = ?, net_salary = ? WHERE id = ?")
        .bind(current.bonus)
        .bind(current.deductions)
        .bind(current.net_salary)
        .bind(payroll_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to update payroll"))?;

    info!(payroll_id, net_salary = current.net_salary, "Payroll adjusted");
    Ok(HttpResponse::Ok().json(current))
}

async fn fetch_payroll(pool: &MySqlPool, payroll_id: u64) -> actix_web::Result<Option<Payroll>> {
    sqlx::query_as::<_, Payroll>(&format!("SELECT {PAYROLL_COLUMNS} FROM payroll WHERE id = ?"))
        .bind(payroll_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| db_error(e, "Failed to fetch payroll"))
}

/// Stored payroll record
#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id" = u64, Path, description = "Payroll ID")),
    responses(
        (status = 200, body = Payroll),
        (status = 404, body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    match fetch_payroll(pool.get_ref(), path.into_inner()).await? {
        Some(p) => Ok(HttpResponse::Ok().json(p)),
        None => Ok(message(StatusCode::NOT_FOUND, "Payroll not found")),
    }
}

/// Stored payroll records, newest month first
#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, body = PaginatedPayrollResponse),
        (status = 400, body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let (page, per_page, offset) = paging(query.page, query.per_page);

    let month = match query.month.as_deref() {
        Some(m) => match clock::parse_month(m) {
            Some((first, _)) => Some(first),
            None => return Ok(message(StatusCode::BAD_REQUEST, "month must look like YYYY-MM")),
        },
        None => None,
    };

    // NULL filters match everything
    let filter = "WHERE (? IS NULL OR employee_id = ?) AND (? IS NULL OR month = ?)";

    let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM payroll {filter}"))
        .bind(query.employee_id)
        .bind(query.employee_id)
        .bind(month)
        .bind(month)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to count payrolls"))?;

    let data = sqlx::query_as::<_, Payroll>(&format!(
        "SELECT {PAYROLL_COLUMNS} FROM payroll {filter} ORDER BY month DESC, employee_id LIMIT ? OFFSET ?"
    ))
    .bind(query.employee_id)
    .bind(query.employee_id)
    .bind(month)
    .bind(month)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to fetch payroll list"))?;

    Ok(HttpResponse::Ok().json(PaginatedPayrollResponse {
        data,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn current_month_counts_up_to_today() {
        let ((from, to), as_of) = payroll_period("2026-03", d(2026, 3, 14)).unwrap();
        assert_eq!(from, d(2026, 3, 1));
        assert_eq!(to, d(2026, 3, 31));
        assert_eq!(as_of, d(2026, 3, 14));
    }

    #[test]
    fn past_month_counts_fully() {
        let (_, as_of) = payroll_period("2026-02", d(2026, 3, 14)).unwrap();
        assert_eq!(as_of, d(2026, 2, 28));
        assert!(payroll_period("2026-13", d(2026, 3, 14)).is_none());
        assert!(payroll_period("march", d(2026, 3, 14)).is_none());
    }

    #[test]
    fn month_label_is_year_and_month() {
        assert_eq!(month_label(d(2026, 3, 1)), "2026-03");
    }
}
