use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Infrastructure: persistence, object storage, outbound HTTP.
pub mod config;
pub mod currency;
pub mod oauth;
pub mod repository;
pub mod storage;

// Domain: identity, access policy and the workflows built on them.
pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod enrollment;
pub mod error;
pub mod models;
pub mod password;
pub mod policy;
pub mod seed;

// HTTP surface.
pub mod handlers;
pub mod routes;
pub mod views;

use auth::AuthUser;
use routes::{admin, authenticated, instructor, public, student};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use currency::CurrencyConverter;
pub use oauth::OAuthState;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register_user, handlers::auth::login, handlers::auth::logout,
        handlers::auth::get_me, handlers::auth::change_password, handlers::auth::google_login,
        handlers::auth::google_callback,
        handlers::courses::list_courses, handlers::courses::get_course, handlers::courses::create_course,
        handlers::courses::edit_course, handlers::courses::delete_course, handlers::courses::convert_price,
        handlers::enrollments::enroll,
        handlers::student::get_student_panel, handlers::student::my_courses,
        handlers::student::student_all_courses,
        handlers::instructor::get_instructor_panel, handlers::instructor::instructor_my_courses,
        handlers::instructor::instructor_all_courses, handlers::instructor::gradebook,
        handlers::instructor::course_enrollments, handlers::instructor::update_enrollment,
        handlers::admin::get_admin_panel, handlers::admin::get_admin_stats, handlers::admin::list_users,
        handlers::admin::update_user_role, handlers::admin::delete_user, handlers::admin::admin_my_courses,
        handlers::admin::admin_all_courses, handlers::admin::admin_course_enrollments,
        handlers::stats::enrollments_per_course, handlers::stats::average_grade_per_course,
        handlers::stats::enrollment_activity, handlers::stats::student_grades,
        handlers::stats::student_status_breakdown
    ),
    components(
        schemas(
            models::Role, models::EnrollmentStatus, models::Course, models::Enrollment,
            models::EnrollmentWithStudent, models::StudentEnrollment, models::GradebookRow,
            models::RegisterUserRequest, models::LoginRequest, models::ChangePasswordRequest,
            models::ChangeRoleRequest, models::EnrollmentUpdateRequest, models::ConvertPriceRequest,
            models::UserProfile, models::LoginResponse, models::CourseView,
            models::EnrollmentUpdateResponse, models::CourseRoster, models::ConversionResponse,
            models::DashboardStats, models::CourseCount, models::CourseAverage, models::DailyCount,
            models::StatusCount, models::AdminPanel, models::InstructorPanel, models::StudentPanel,
        )
    ),
    tags(
        (name = "course-portal", description = "Course enrollment portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Every service a request may need, cloned per request. Tests build it with in-memory
/// doubles; `main` builds it with Postgres, S3 and the HTTP providers.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    /// Price conversion through the ordered FX provider chain.
    pub fx: Arc<CurrencyConverter>,
    /// `None` when Google sign-in is not configured.
    pub oauth: OAuthState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 when no `AuthUser` can be resolved.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routers, the session layer and the observability stack.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let protected = authenticated::authenticated_routes()
        .merge(admin::admin_routes())
        .merge(instructor::instructor_routes())
        .merge(student::student_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// One `http_request` span per request, tagged with the `x-request-id` set above.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
