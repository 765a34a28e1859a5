use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{Role, User, UserProfile},
    repository::RepositoryState,
};

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "session";

/// Claims
///
/// Payload of the session JWT issued at login. Only the user id is trusted from the token;
/// the role is re-read from the database on every request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id.
    pub sub: i64,
    /// Expiration Time (exp)
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

impl From<AuthUser> for UserProfile {
    fn from(user: AuthUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
        }
    }
}

/// issue_session_token
///
/// Signs a session JWT for `user`, valid for `session_ttl_hours`.
pub fn issue_session_token(user_id: i64, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now();
    let expires_at = Duration::try_hours(config.session_ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal(format!("session TTL out of range: {}h", config.session_ttl_hours)))?;
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign session token: {e}")))
}

/// Returns the user id of a valid, unexpired session token.
pub fn decode_session_token(token: &str, config: &AppConfig) -> Option<i64> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.sub)
    .ok()
}

/// `Set-Cookie` value storing the session token. `Secure` is added in production.
pub fn session_cookie(token: &str, config: &AppConfig) -> String {
    let max_age = config.session_ttl_hours * 3600;
    let secure = if config.env == Env::Production { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}{secure}")
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Finds a cookie by name in the request's `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. Local bypass: in `Env::Local`, an `x-user-id` header naming an existing user.
/// 2. `Authorization: Bearer <jwt>`.
/// 3. The `session` cookie set at login.
///
/// The user is always re-loaded from the repository, so deleted users and role changes
/// take effect immediately. Rejection: 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<i64>().ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await {
                    return Ok(user.into());
                }
            }
        }

        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);

        let token = bearer
            .or_else(|| cookie_value(&parts.headers, SESSION_COOKIE))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let user_id = decode_session_token(&token, &config).ok_or(StatusCode::UNAUTHORIZED)?;

        // A valid token for a deleted user is still rejected.
        let user = repo.get_user(user_id).await.ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(user.into())
    }
}
