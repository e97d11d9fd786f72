use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use axum::{
    Json,
    body::Body,
    extract::FromRequestParts,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use db::models::user::Role;

#[derive(serde::Serialize, Default)]
pub struct Empty;

/// Extracts and validates the caller from the request, then re-inserts the
/// `AuthUser` into request extensions so handlers can read it.
async fn extract_and_insert_authuser(
    mut req: Request<Body>,
) -> Result<(Request<Body>, AuthUser), (StatusCode, Json<ApiResponse<Empty>>)> {
    let (mut parts, body) = req.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Authentication required")),
            )
        })?;

    req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user.clone());
    Ok((req, user))
}

/// Basic guard to ensure the request is authenticated.
pub async fn allow_authenticated(
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, _user) = extract_and_insert_authuser(req).await?;

    Ok(next.run(req).await)
}

/// Guard for teacher-facing endpoints. Admins pass as well; per-session
/// ownership is still enforced by the handlers themselves.
pub async fn allow_teacher(
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, user) = extract_and_insert_authuser(req).await?;

    if !matches!(user.0.role, Role::Teacher | Role::Admin) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error("Teacher access required")),
        ));
    }

    Ok(next.run(req).await)
}
