pub mod analytics;
pub mod attendance;
pub mod department;
pub mod employee;
pub mod holiday;
pub mod leave_request;
pub mod payroll;
pub mod schedule;

use actix_web::HttpResponse;
use actix_web::http::StatusCode;

use crate::models::MessageResponse;
use crate::schedule::ScheduleError;

/// Logs a storage failure and hides it behind a generic 500.
pub(crate) fn db_error(e: sqlx::Error, context: &'static str) -> actix_web::Error {
    tracing::error!(error = %e, "{}", context);
    actix_web::error::ErrorInternalServerError("Internal Server Error")
}

/// MySQL reports unique key violations with SQLSTATE 23000.
pub(crate) fn is_duplicate_key(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

pub(crate) fn message(status: StatusCode, text: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(MessageResponse::new(text))
}

/// A missing schedule is a setup problem the office has to fix, so it is
/// reported as a conflict rather than a server fault.
pub(crate) fn schedule_error(e: ScheduleError) -> actix_web::Error {
    match e {
        ScheduleError::NotFound(department_id) => {
            tracing::warn!(?department_id, "No work schedule configured");
            actix_web::error::InternalError::from_response(
                "no schedule",
                message(StatusCode::CONFLICT, "No work schedule configured for your department"),
            )
            .into()
        }
        ScheduleError::Database(e) => db_error(e, "Failed to load work schedule"),
        other => {
            tracing::error!(error = %other, "Stored work schedule is malformed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        }
    }
}

/// Page/per_page with the same clamping everywhere.
pub(crate) fn paging(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(10).clamp(1, 100);
    (page, per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_clamped() {
        assert_eq!(paging(None, None), (1, 10, 0));
        assert_eq!(paging(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(paging(Some(3), Some(20)), (3, 20, 40));
    }

    #[test]
    fn missing_schedule_is_a_conflict() {
        let err = schedule_error(ScheduleError::NotFound(Some(2)));
        assert_eq!(err.as_response_error().status_code(), StatusCode::CONFLICT);

        let err = schedule_error(ScheduleError::InvalidTime("x".into()));
        assert_eq!(err.as_response_error().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
