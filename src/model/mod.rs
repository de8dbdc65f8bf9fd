pub mod attendance;
pub mod department;
pub mod employee;
pub mod holiday;
pub mod leave_request;
pub mod payroll;
pub mod role;
pub mod user;
pub mod work_schedule;
