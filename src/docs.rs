use crate::api::analytics::{TeacherAnalyticsResponse, TeacherBehavior};
use crate::api::attendance::{
    AttendanceSummaryResponse, CheckInReq, CheckInResponse, CheckOutReq, CheckOutResponse,
    LocateReq, LocateResponse, LocationFix,
};
use crate::api::department::CreateDepartment;
use crate::api::employee::{CreateEmployee, EmployeeListResponse};
use crate::api::holiday::CreateHoliday;
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::api::payroll::{
    GeneratePayroll, GeneratePayrollResponse, GeneratedPayroll, PaginatedPayrollResponse,
    SalaryReport, UpdatePayroll,
};
use crate::api::schedule::ScheduleReq;
use crate::geo::{GeoPoint, LocationResult};
use crate::model::attendance::Attendance;
use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::holiday::Holiday;
use crate::model::leave_request::{ApplicantKind, LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::Payroll;
use crate::model::work_schedule::{Geofence, WorkScheduleResponse};
use crate::models::{LoginReqDto, MessageResponse, RegisterReq, TokenPair};
use crate::report::behavior::{BehaviorMetrics, RiskLevel};
use crate::report::salary::SalaryBreakdown;
use crate::schedule::AttendanceStatus;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "School Attendance API",
        version = "1.0.0",
        description = r#"
## School Attendance & Payroll

Staff of a school check in with a selfie and their location, and the office
turns attendance into monthly salary and punctuality reports.

### Key Features
- **Attendance**: geofenced, photo-verified check-in and check-out,
  PRESENT / LATE / ABSENT / ON_LEAVE classification against work schedules
- **Work schedules**: per-department hours, grace minutes, Saturday hours
  and geofence, with a global default
- **Leave**: staff and student leave with approval flow
- **Payroll**: month salary from attendance (Hajar Divas, late and early
  deductions, bonus and deductions)
- **Analytics**: teacher punctuality and risk scores

### Security
Protected endpoints take a **JWT Bearer** access token from `/auth/login`.
All times are Indian Standard Time.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::register,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::attendance::locate,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::my_attendance,
        crate::api::attendance::daily_attendance,
        crate::api::attendance::attendance_summary,

        crate::api::schedule::list_schedules,
        crate::api::schedule::create_schedule,
        crate::api::schedule::update_schedule,
        crate::api::schedule::delete_schedule,

        crate::api::holiday::list_holidays,
        crate::api::holiday::create_holiday,
        crate::api::holiday::delete_holiday,

        crate::api::department::list_departments,
        crate::api::department::create_department,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::payroll::generate_payroll,
        crate::api::payroll::salary_report,
        crate::api::payroll::update_payroll,
        crate::api::payroll::get_payroll,
        crate::api::payroll::list_payrolls,

        crate::api::analytics::teacher_analytics
    ),
    components(
        schemas(
            MessageResponse,
            RegisterReq,
            LoginReqDto,
            TokenPair,
            GeoPoint,
            Geofence,
            LocationFix,
            LocationResult,
            LocateReq,
            LocateResponse,
            CheckInReq,
            CheckInResponse,
            CheckOutReq,
            CheckOutResponse,
            AttendanceStatus,
            Attendance,
            AttendanceSummaryResponse,
            ScheduleReq,
            WorkScheduleResponse,
            Holiday,
            CreateHoliday,
            Department,
            CreateDepartment,
            ApplicantKind,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            CreateLeave,
            LeaveFilter,
            LeaveListResponse,
            Employee,
            CreateEmployee,
            EmployeeListResponse,
            Payroll,
            SalaryBreakdown,
            SalaryReport,
            GeneratePayroll,
            GeneratedPayroll,
            GeneratePayrollResponse,
            UpdatePayroll,
            PaginatedPayrollResponse,
            RiskLevel,
            BehaviorMetrics,
            TeacherBehavior,
            TeacherAnalyticsResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token APIs"),
        (name = "Attendance", description = "Check-in, check-out and attendance records"),
        (name = "Schedule", description = "Work schedule administration"),
        (name = "Holiday", description = "School holidays"),
        (name = "Department", description = "Departments"),
        (name = "Leave", description = "Staff and student leave"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Payroll", description = "Salary generation and records"),
        (name = "Analytics", description = "Teacher punctuality analytics"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_protected_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/attendance/check-in"));
        assert!(doc.paths.paths.contains_key("/api/payroll/report"));
        assert!(doc.paths.paths.contains_key("/auth/login"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
