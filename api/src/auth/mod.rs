pub mod claims;
pub mod extractors;
pub mod guards;
pub mod middleware;

pub use claims::{AuthUser, Claims};

use chrono::{Duration, Utc};
use db::models::user::Role;
use jsonwebtoken::{EncodingKey, Header, encode, errors::Error as JwtError};
use util::config;

/// Generates a JWT and its expiry timestamp for a given user.
pub fn generate_jwt(user_id: i64, role: Role) -> Result<(String, String), JwtError> {
    let expiry = Utc::now() + Duration::minutes(config::jwt_duration_minutes() as i64);
    let claims = Claims {
        sub: user_id,
        role,
        exp: expiry.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config::jwt_secret().as_bytes()),
    )?;

    Ok((token, expiry.to_rfc3339()))
}
