use crate::{
    api::{db_error, is_duplicate_key},
    auth::{
        auth::AuthUser,
        jwt::{Subject, generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    model::{role::Role, user::User},
    models::{Claims, LoginReqDto, MessageResponse, RegisterReq, TokenPair, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and records the refresh token.
async fn issue_tokens(
    subject: &Subject<'_>,
    pool: &MySqlPool,
    config: &Config,
) -> actix_web::Result<TokenPair> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(|e| {
            error!(error = %e, "Failed to sign refresh token");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| db_error(e, "Failed to store refresh token"))?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Create a login for an employee (admin only)
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = MessageResponse),
        (status = 400, description = "Invalid payload", body = MessageResponse),
        (status = 409, description = "Username already taken", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn register(
    auth: AuthUser,
    user: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let username = user.username.trim().to_lowercase();
    if username.is_empty() || user.password.is_empty() {
        return Ok(HttpResponse::BadRequest().json(MessageResponse::new(
            "Username and password must not be empty",
        )));
    }
    if Role::from_id(user.role_id).is_none() {
        return Ok(HttpResponse::BadRequest().json(MessageResponse::new("Unknown role")));
    }

    let hashed = hash_password(&user.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let result = sqlx::query(
        r#"INSERT INTO users (username, password, role_id, employee_id, is_active) VALUES (?, ?, ?, ?, TRUE)"#,
    )
    .bind(&username)
    .bind(&hashed)
    .bind(user.role_id)
    .bind(user.employee_id)
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            info!(username = %username, role_id = user.role_id, "User registered");
            Ok(HttpResponse::Created().json(MessageResponse::new("User registered successfully")))
        }
        Err(e) if is_duplicate_key(&e) => Ok(HttpResponse::Conflict()
            .json(MessageResponse::new("Username already taken"))),
        Err(e) => Err(db_error(e, "Failed to register user")),
    }
}

/// Exchange credentials for tokens
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return Ok(HttpResponse::BadRequest().body("Username or password required"));
    }

    let db_user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password, role_id, employee_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Database error while fetching user"))?;

    let db_user = match db_user {
        Some(u) if u.is_active => u,
        Some(_) => {
            info!("Login refused: account disabled");
            return Ok(HttpResponse::Unauthorized().body("Invalid credentials"));
        }
        None => {
            info!("Invalid credentials: user not found");
            return Ok(HttpResponse::Unauthorized().body("Invalid credentials"));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Ok(HttpResponse::Unauthorized().body("Invalid credentials"));
    }

    let subject = Subject {
        user_id: db_user.id,
        username: &db_user.username,
        role: db_user.role_id,
        employee_id: db_user.employee_id,
    };
    let tokens = issue_tokens(&subject, pool.get_ref(), &config).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not worth failing the login over
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    Ok(HttpResponse::Ok().json(tokens))
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Rotate a refresh token
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Refresh token invalid or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let Some(claims) = refresh_claims(&req, &config) else {
        return Ok(HttpResponse::Unauthorized().finish());
    };

    // Revoking and checking in one statement keeps a token single-use.
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    .map_err(|e| db_error(e, "Failed to revoke refresh token"))?;

    if revoked.rows_affected() == 0 {
        info!(user_id = claims.user_id, "Refresh with unknown or revoked token");
        return Ok(HttpResponse::Unauthorized().finish());
    }

    let subject = Subject {
        user_id: claims.user_id,
        username: &claims.sub,
        role: claims.role,
        employee_id: claims.employee_id,
    };
    let tokens = issue_tokens(&subject, pool.get_ref(), &config).await?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// Revoke a refresh token
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    // Logout always succeeds from the client's point of view.
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::NoContent().finish();
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}
