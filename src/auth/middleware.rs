use crate::api::message;
use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
    web::Data,
};

fn unauthorized(req: ServiceRequest, reason: &str) -> ServiceResponse<BoxBody> {
    tracing::debug!(path = %req.path(), reason, "Rejected unauthenticated request");
    req.into_response(message(StatusCode::UNAUTHORIZED, reason))
}

/// Resolves the bearer token into an `AuthUser` stored in the request
/// extensions, where the `AuthUser` extractor picks it up.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?
        .clone();

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned);

    let Some(token) = token else {
        return Ok(unauthorized(req, "Missing or malformed Authorization header"));
    };

    let auth_user = match verify_token(&token, &config.jwt_secret) {
        Ok(claims) => match AuthUser::from_claims(claims) {
            Ok(user) => user,
            Err(reason) => return Ok(unauthorized(req, reason)),
        },
        Err(_) => return Ok(unauthorized(req, "Invalid or expired token")),
    };

    tracing::debug!(user_id = auth_user.user_id, role = ?auth_user.role, "Authenticated request");
    req.extensions_mut().insert(auth_user);

    next.call(req).await
}
