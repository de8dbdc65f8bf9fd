use crate::{
    api::{db_error, is_duplicate_key, message, paging},
    auth::auth::AuthUser,
    model::employee::{EMPLOYEE_COLUMNS, Employee},
    models::MessageResponse,
    utils::db_utils::{build_update_sql, execute_update},
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

/// Columns a partial update may touch.
const UPDATABLE_COLUMNS: &[&str] = &[
    "employee_code",
    "first_name",
    "last_name",
    "email",
    "phone",
    "department_id",
    "designation",
    "is_teacher",
    "base_salary",
    "hire_date",
    "status",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "T-014")]
    pub employee_code: String,
    #[schema(example = "Meera")]
    pub first_name: String,
    #[schema(example = "Patel")]
    pub last_name: String,
    #[schema(example = "meera.patel@school.edu", format = "email")]
    pub email: String,
    #[schema(example = "+919876543210", nullable = true)]
    pub phone: Option<String>,
    #[schema(example = 2, nullable = true)]
    pub department_id: Option<u64>,
    #[schema(example = "Mathematics Teacher")]
    pub designation: String,
    #[serde(default)]
    pub is_teacher: bool,
    /// Monthly base salary
    #[schema(example = 32000.0)]
    pub base_salary: f64,
    #[schema(example = "2022-06-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub is_teacher: Option<bool>,
    /// active or inactive
    pub status: Option<String>,
    /// Matches name, email or employee code
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 42)]
    pub total: i64,
}

fn validate_employee(e: &CreateEmployee) -> Result<(), &'static str> {
    if e.employee_code.trim().is_empty() || e.first_name.trim().is_empty() {
        return Err("employee_code and first_name are required");
    }
    if !e.email.contains('@') {
        return Err("email is not valid");
    }
    if !(e.base_salary >= 0.0 && e.base_salary.is_finite()) {
        return Err("base_salary must be zero or more");
    }
    Ok(())
}

/// Same rules as `validate_employee`, for the fields a partial update carries.
fn validate_employee_update(payload: &Value) -> Result<(), &'static str> {
    // Non-objects are turned away by `build_update_sql`.
    let Some(fields) = payload.as_object() else {
        return Ok(());
    };

    for (key, value) in fields {
        match key.as_str() {
            "employee_code" | "first_name" => {
                if !value.as_str().is_some_and(|v| !v.trim().is_empty()) {
                    return Err("employee_code and first_name cannot be empty");
                }
            }
            "email" => {
                if !value.as_str().is_some_and(|v| v.contains('@')) {
                    return Err("email is not valid");
                }
            }
            "base_salary" => {
                if !value.as_f64().is_some_and(|v| v >= 0.0 && v.is_finite()) {
                    return Err("base_salary must be zero or more");
                }
            }
            "status" => {
                if !matches!(value.as_str(), Some("active" | "inactive")) {
                    return Err("status must be active or inactive");
                }
            }
            "is_teacher" => {
                if !value.is_boolean() {
                    return Err("is_teacher must be true or false");
                }
            }
            "hire_date" => {
                if !value
                    .as_str()
                    .is_some_and(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok())
                {
                    return Err("hire_date must be YYYY-MM-DD");
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = MessageResponse),
        (status = 409, description = "Code or email already used", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    if let Err(reason) = validate_employee(&payload) {
        return Ok(message(StatusCode::BAD_REQUEST, reason));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees
            (employee_code, first_name, last_name, email, phone, department_id,
             designation, is_teacher, base_salary, hire_date, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active')
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim().to_lowercase())
    .bind(payload.phone.as_deref())
    .bind(payload.department_id)
    .bind(payload.designation.trim())
    .bind(payload.is_teacher)
    .bind(payload.base_salary)
    .bind(payload.hire_date)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(done) => {
            info!(employee_id = done.last_insert_id(), code = %payload.employee_code, "Employee created");
            Ok(message(StatusCode::CREATED, "Employee created successfully"))
        }
        Err(e) if is_duplicate_key(&e) => Ok(message(
            StatusCode::CONFLICT,
            "Employee code or email already exists",
        )),
        Err(e) => Err(db_error(e, "Failed to create employee")),
    }
}

enum FilterValue {
    U64(u64),
    Bool(bool),
    Str(String),
}

/// List employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses((status = 200, description = "Paginated employee list", body = EmployeeListResponse)),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let (page, per_page, offset) = paging(query.page, query.per_page);

    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        bindings.push(FilterValue::U64(department_id));
    }
    if let Some(is_teacher) = query.is_teacher {
        conditions.push("is_teacher = ?");
        bindings.push(FilterValue::Bool(is_teacher));
    }
    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(FilterValue::Str(status.clone()));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ? OR employee_code LIKE ?)");
        let like = format!("%{search}%");
        for _ in 0..4 {
            bindings.push(FilterValue::Str(like.clone()));
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM employees {where_clause}");
    debug!(sql = %count_sql, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for b in &bindings {
        count_query = match b {
            FilterValue::U64(v) => count_query.bind(*v),
            FilterValue::Bool(v) => count_query.bind(*v),
            FilterValue::Str(v) => count_query.bind(v.as_str()),
        };
    }
    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to count employees"))?;

    let data_sql = format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
    );
    debug!(sql = %data_sql, page, per_page, offset, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for b in &bindings {
        data_query = match b {
            FilterValue::U64(v) => data_query.bind(*v),
            FilterValue::Bool(v) => data_query.bind(*v),
            FilterValue::Str(v) => data_query.bind(v.as_str()),
        };
    }
    let employees = data_query
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to fetch employees"))?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body(content = Object, description = "Any subset of the employee fields"),
    responses(
        (status = 200, description = "Employee updated", body = MessageResponse),
        (status = 400, description = "Unknown or invalid field", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    if let Err(reason) = validate_employee_update(&body) {
        return Ok(message(StatusCode::BAD_REQUEST, reason));
    }

    let update = build_update_sql("employees", &body, UPDATABLE_COLUMNS, "id", employee_id)?;

    let affected = match execute_update(pool.get_ref(), update).await {
        Ok(n) => n,
        Err(e) if is_duplicate_key(&e) => {
            return Ok(message(StatusCode::CONFLICT, "Employee code or email already exists"));
        }
        Err(e) => return Err(db_error(e, "Failed to update employee")),
    };

    if affected == 0 {
        return Ok(message(StatusCode::NOT_FOUND, "Employee not found"));
    }

    info!(employee_id, "Employee updated");
    Ok(message(StatusCode::OK, "Employee updated successfully"))
}

/// Deactivate Employee
///
/// Attendance and payroll history stays, so the record is only marked inactive.
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee deactivated", body = MessageResponse),
        (status = 404, description = "Employee not found", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let employee_id = path.into_inner();

    let result = sqlx::query("UPDATE employees SET status = 'inactive' WHERE id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to deactivate employee"))?;

    if result.rows_affected() == 0 {
        return Ok(message(StatusCode::NOT_FOUND, "Employee not found"));
    }

    if let Err(e) = sqlx::query("UPDATE users SET is_active = FALSE WHERE employee_id = ?")
        .bind(employee_id)
        .execute(pool.get_ref())
        .await
    {
        tracing::error!(error = %e, employee_id, "Failed to disable logins of deactivated employee");
    }

    info!(employee_id, "Employee deactivated");
    Ok(message(StatusCode::OK, "Employee deactivated"))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = MessageResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();
    if auth.employee_id != Some(employee_id) {
        auth.require_hr_or_admin()?;
    }

    let employee = sqlx::query_as::<_, Employee>(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?"
    ))
    .bind(employee_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to fetch employee"))?;

    match employee {
        Some(emp) => Ok(HttpResponse::Ok().json(emp)),
        None => Ok(message(StatusCode::NOT_FOUND, "Employee not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_employee() -> CreateEmployee {
        CreateEmployee {
            employee_code: "T-014".into(),
            first_name: "Meera".into(),
            last_name: "Patel".into(),
            email: "meera.patel@school.edu".into(),
            phone: None,
            department_id: Some(2),
            designation: "Mathematics Teacher".into(),
            is_teacher: true,
            base_salary: 32000.0,
            hire_date: NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(),
        }
    }

    #[test]
    fn validates_required_fields() {
        assert!(validate_employee(&new_employee()).is_ok());

        let mut e = new_employee();
        e.email = "nope".into();
        assert!(validate_employee(&e).is_err());

        let mut e = new_employee();
        e.base_salary = -1.0;
        assert!(validate_employee(&e).is_err());

        let mut e = new_employee();
        e.employee_code = "  ".into();
        assert!(validate_employee(&e).is_err());
    }

    #[test]
    fn partial_update_follows_create_rules() {
        assert_eq!(
            validate_employee_update(&json!({"base_salary": -50000.0})),
            Err("base_salary must be zero or more")
        );
        assert!(validate_employee_update(&json!({"status": "fired"})).is_err());
        assert!(validate_employee_update(&json!({"first_name": "  "})).is_err());
        assert!(validate_employee_update(&json!({"email": "nope"})).is_err());
        assert!(validate_employee_update(&json!({"hire_date": "01/06/2022"})).is_err());

        assert!(validate_employee_update(&json!({
            "base_salary": 34000,
            "status": "inactive",
            "designation": "Vice Principal"
        }))
        .is_ok());
    }

    #[test]
    fn primary_key_is_not_updatable() {
        assert!(!UPDATABLE_COLUMNS.contains(&"id"));
        assert!(UPDATABLE_COLUMNS.contains(&"base_salary"));
    }
}
