use crate::{AppState, handlers};
use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable by anonymous clients: health, account creation, sign-in and the
/// read-only course catalog.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // The catalog doubles as the landing page; logout redirects here.
        .route("/", get(|| async { Redirect::to("/cursos") }))
        .route("/register", post(handlers::auth::register_user))
        // POST /login
        // Sets the HttpOnly session cookie and returns the panel to redirect to.
        .route("/login", post(handlers::auth::login))
        .route("/logout", get(handlers::auth::logout))
        // GET /auth/google/*
        // 404 unless GOOGLE_CLIENT_ID/SECRET/REDIRECT_URL are configured.
        .route("/auth/google/login", get(handlers::auth::google_login))
        .route("/auth/google/callback", get(handlers::auth::google_callback))
        .route("/cursos", get(handlers::courses::list_courses))
        .route("/cursos/{id}", get(handlers::courses::get_course))
}
