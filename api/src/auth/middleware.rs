use crate::auth::claims::AuthUser;
use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::TypedHeader;
use headers::UserAgent;
use tracing::info;

/// Logs method, path, user ID (if authenticated) and user-agent for each
/// incoming HTTP request. Skips CORS preflight `OPTIONS` requests.
pub async fn log_request(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let (mut parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        let req = Request::from_parts(parts, body);
        return Ok(next.run(req).await);
    }

    let user_id = AuthUser::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|AuthUser(c)| c.sub);

    let user_agent = TypedHeader::<UserAgent>::from_request_parts(&mut parts, &())
        .await
        .ok()
        .map(|TypedHeader(ua)| ua.to_string());

    info!(
        method = ?parts.method,
        path = %parts.uri.path(),
        user = user_id.unwrap_or(0),
        user_agent = user_agent.unwrap_or_else(|| "unknown".into()),
        "Incoming request"
    );

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}
