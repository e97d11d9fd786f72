use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use axum_extra::extract::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use util::config;

use crate::auth::claims::{AuthUser, Claims};

/// Implements extraction of `AuthUser` from request headers.
///
/// Checks for a valid Bearer token in the `Authorization` header, verifies
/// the JWT against the configured secret, and exposes the claims as an
/// `AuthUser` handler argument.
///
/// # Errors
/// Returns `401 Unauthorized` if the header is missing, malformed, or the
/// token is invalid or expired.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    (
                        StatusCode::UNAUTHORIZED,
                        "Missing or invalid Authorization header",
                    )
                })?;

        let token_data = decode::<Claims>(
            bearer.token(),
            &DecodingKey::from_secret(config::jwt_secret().as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;

        Ok(AuthUser(token_data.claims))
    }
}
