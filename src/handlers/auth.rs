use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState, accounts,
    auth::{AuthUser, clear_session_cookie, cookie_value, issue_session_token, session_cookie},
    error::AppError,
    models::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterUserRequest, UserProfile},
    oauth::OAuthError,
    views::{panel_path, redirect_by_role},
};

const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// register_user
///
/// [Public Route] Creates a student (default) or instructor account.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Invalid input or admin role requested"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let user = accounts::register(state.repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// login
///
/// [Public Route] Verifies credentials and opens a session. The JWT is returned in the
/// body and also set as the HttpOnly `session` cookie.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Bad credentials"),
        (status = 403, description = "Role does not match the account")
    )
)]
pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> Result<Response, AppError> {
    let user = accounts::authenticate(state.repo.as_ref(), &payload).await?;
    let token = issue_session_token(user.id, &state.config)?;

    tracing::info!(user_id = user.id, role = %user.role, "login succeeded");

    let body = LoginResponse {
        token: token.clone(),
        redirect_to: panel_path(user.role).to_string(),
        user: user.into(),
    };

    Ok((
        AppendHeaders([(header::SET_COOKIE, session_cookie(&token, &state.config))]),
        Json(body),
    )
        .into_response())
}

/// logout
///
/// [Public Route] Expires the session cookie and sends the browser home.
#[utoipa::path(get, path = "/logout", responses((status = 303, description = "Redirect to /")))]
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
        Redirect::to("/"),
    )
}

/// get_me
///
/// [Authenticated Route] The caller's profile.
#[utoipa::path(get, path = "/me", responses((status = 200, description = "Profile", body = UserProfile)))]
pub async fn get_me(user: AuthUser) -> Json<UserProfile> {
    Json(user.into())
}

/// change_password
///
/// [Authenticated Route] Requires the current password.
#[utoipa::path(
    post,
    path = "/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Changed"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    accounts::change_password(state.repo.as_ref(), &user, &payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// google_login
///
/// [Public Route] Starts the Google sign-in flow. 404 when OAuth is not configured.
#[utoipa::path(
    get,
    path = "/auth/google/login",
    responses(
        (status = 303, description = "Redirect to Google"),
        (status = 404, description = "OAuth not configured")
    )
)]
pub async fn google_login(State(state): State<AppState>) -> Result<Response, AppError> {
    let provider = state.oauth.as_ref().ok_or_else(|| AppError::not_found("oauth provider"))?;

    let csrf_state = Uuid::new_v4().simple().to_string();
    let cookie = format!("{OAUTH_STATE_COOKIE}={csrf_state}; HttpOnly; SameSite=Lax; Path=/auth; Max-Age=600");

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(&provider.authorize_url(&csrf_state)),
    )
        .into_response())
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// google_callback
///
/// [Public Route] Completes the Google flow. First-time users become students.
#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(OAuthCallback),
    responses(
        (status = 303, description = "Redirect to the user's panel"),
        (status = 401, description = "State mismatch"),
        (status = 502, description = "Provider failure")
    )
)]
pub async fn google_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(callback): Query<OAuthCallback>,
) -> Result<Response, AppError> {
    let provider = state.oauth.as_ref().ok_or_else(|| AppError::not_found("oauth provider"))?;

    let expected = cookie_value(&headers, OAUTH_STATE_COOKIE);
    if expected.is_none() || expected != callback.state {
        return Err(OAuthError::StateMismatch.into());
    }

    let code = callback
        .code
        .ok_or_else(|| AppError::Validation("missing authorization code".to_string()))?;

    let identity = provider.exchange_code(&code).await?;
    let user = accounts::sign_in_with_oauth(state.repo.as_ref(), &identity).await?;
    let token = issue_session_token(user.id, &state.config)?;

    tracing::info!(user_id = user.id, "oauth login succeeded");

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, session_cookie(&token, &state.config)),
            (
                header::SET_COOKIE,
                format!("{OAUTH_STATE_COOKIE}=; HttpOnly; SameSite=Lax; Path=/auth; Max-Age=0"),
            ),
        ]),
        redirect_by_role(user.role),
    )
        .into_response())
}
