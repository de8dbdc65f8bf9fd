use crate::{
    api::{db_error, is_duplicate_key, message},
    auth::auth::AuthUser,
    model::department::Department,
    models::MessageResponse,
};
use actix_web::{HttpResponse, Responder, http::StatusCode, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Primary Teaching")]
    pub name: String,
}

/// List departments
#[utoipa::path(
    get,
    path = "/api/departments",
    responses((status = 200, description = "All departments", body = [Department])),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let departments = sqlx::query_as::<_, Department>("SELECT id, name FROM departments ORDER BY name")
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| db_error(e, "Failed to list departments"))?;

    Ok(HttpResponse::Ok().json(departments))
}

/// Create a department (Admin)
#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created", body = MessageResponse),
        (status = 409, description = "Name already used", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateDepartment>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Ok(message(StatusCode::BAD_REQUEST, "Department name is required"));
    }

    match sqlx::query("INSERT INTO departments (name) VALUES (?)")
        .bind(name)
        .execute(pool.get_ref())
        .await
    {
        Ok(_) => Ok(message(StatusCode::CREATED, "Department created")),
        Err(e) if is_duplicate_key(&e) => Ok(message(StatusCode::CONFLICT, "Department already exists")),
        Err(e) => Err(db_error(e, "Failed to create department")),
    }
}
