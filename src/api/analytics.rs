use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{debug, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{attendance::employee_period, db_error, holiday, message, schedule_error},
    auth::auth::AuthUser,
    model::employee::{EMPLOYEE_COLUMNS, Employee},
    models::MessageResponse,
    report::behavior::{BehaviorMetrics, behavior_metrics},
    schedule::{ScheduleError, ScheduleStore, clock, resolve_schedule},
};

const MAX_RANGE_DAYS: i64 = 366;

#[derive(Deserialize, IntoParams)]
pub struct AnalyticsQuery {
    /// Defaults to the first day of the current month
    pub from: Option<NaiveDate>,
    /// Defaults to today
    pub to: Option<NaiveDate>,
    pub department_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct TeacherBehavior {
    pub employee_id: u64,
    #[schema(example = "Meera Patel")]
    pub name: String,
    pub department_id: Option<u64>,
    pub metrics: BehaviorMetrics,
}

#[derive(Serialize, ToSchema)]
pub struct TeacherAnalyticsResponse {
    #[schema(value_type = String, format = "date")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to: NaiveDate,
    /// Highest risk first
    pub teachers: Vec<TeacherBehavior>,
}

fn resolve_range(from: Option<NaiveDate>, to: Option<NaiveDate>, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), &'static str> {
    let to = to.unwrap_or(today);
    let from = match from {
        Some(from) => from,
        None => to.with_day(1).ok_or("Invalid date range")?,
    };
    if from > to {
        return Err("from cannot be after to");
    }
    if (to - from).num_days() >= MAX_RANGE_DAYS {
        return Err("Date range cannot exceed one year");
    }
    Ok((from, to))
}

fn rank(teachers: &mut [TeacherBehavior]) {
    teachers.sort_by(|a, b| {
        b.metrics
            .risk_score
            .cmp(&a.metrics.risk_score)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Punctuality and risk of every active teacher (HR/Admin)
#[utoipa::path(
    get,
    path = "/api/analytics/teachers",
    params(AnalyticsQuery),
    responses(
        (status = 200, description = "Teacher behaviour", body = TeacherAnalyticsResponse),
        (status = 400, description = "Invalid range", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Analytics"
)]
pub async fn teacher_analytics(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    schedules: web::Data<ScheduleStore>,
    query: web::Query<AnalyticsQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let today = clock::ist_date(Utc::now());
    let (from, to) = match resolve_range(query.from, query.to, today) {
        Ok(range) => range,
        Err(reason) => return Ok(message(StatusCode::BAD_REQUEST, reason)),
    };

    let employees = sqlx::query_as::<_, Employee>(&format!(
        r#"
        SELECT {EMPLOYEE_COLUMNS} FROM employees
        WHERE is_teacher = TRUE AND status = 'active'
        AND (? IS NULL OR department_id = ?)
        ORDER BY id
        "#
    ))
    .bind(query.department_id)
    .bind(query.department_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to fetch teachers"))?;

    let holidays = holiday::holidays_between(pool.get_ref(), from, to).await?;
    let mut teachers = Vec::with_capacity(employees.len());

    for employee in employees {
        let schedule = match resolve_schedule(schedules.get_ref(), employee.department_id).await {
            Ok(schedule) => schedule,
            Err(e @ ScheduleError::NotFound(_)) => {
                warn!(employee_id = employee.id, error = %e, "Teacher left out of analytics");
                continue;
            }
            Err(e) => return Err(schedule_error(e)),
        };

        let period = employee_period(pool.get_ref(), &schedule, employee.id, &holidays, (from, to), today).await?;
        teachers.push(TeacherBehavior {
            employee_id: employee.id,
            name: employee.full_name(),
            department_id: employee.department_id,
            metrics: behavior_metrics(&period.summary, period.working_days),
        });
    }

    rank(&mut teachers);
    debug!(%from, %to, teachers = teachers.len(), "Teacher analytics computed");

    Ok(HttpResponse::Ok().json(TeacherAnalyticsResponse { from, to, teachers }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::AttendanceSummary;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn range_defaults_to_month_so_far() {
        assert_eq!(resolve_range(None, None, d(3, 14)), Ok((d(3, 1), d(3, 14))));
        assert_eq!(resolve_range(Some(d(2, 1)), Some(d(2, 28)), d(3, 14)), Ok((d(2, 1), d(2, 28))));
    }

    #[test]
    fn range_must_be_ordered_and_bounded() {
        assert!(resolve_range(Some(d(3, 10)), Some(d(3, 1)), d(3, 14)).is_err());
        let far = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert!(resolve_range(Some(far), Some(d(3, 1)), d(3, 14)).is_err());
    }

    #[test]
    fn riskiest_teacher_comes_first() {
        let entry = |id, name: &str, late_days| TeacherBehavior {
            employee_id: id,
            name: name.to_string(),
            department_id: None,
            metrics: behavior_metrics(
                &AttendanceSummary {
                    present_days: 20 - late_days,
                    late_days,
                    late_minutes: u64::from(late_days) * 10,
                    ..Default::default()
                },
                20,
            ),
        };

        let mut teachers = vec![entry(1, "Asha", 0), entry(2, "Ravi", 8), entry(3, "Bela", 0)];
        rank(&mut teachers);

        let order: Vec<_> = teachers.iter().map(|t| t.employee_id).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }
}
