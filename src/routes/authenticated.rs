use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes for any signed-in user. Course management is open to instructors and admins,
/// enrollment to students; the handlers decide through the policy.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/me/password", post(handlers::auth::change_password))
        // --- Course Management ---
        // POST /cursos
        // Multipart form. The image is optional and an upload failure does not abort creation.
        .route("/cursos", post(handlers::courses::create_course))
        .route("/cursos/{id}/edit", post(handlers::courses::edit_course))
        .route("/cursos/{id}/delete", post(handlers::courses::delete_course))
        // POST /cursos/{id}/convert
        // Converts a USD price through the FX provider chain.
        .route("/cursos/{id}/convert", post(handlers::courses::convert_price))
        // --- Enrollment ---
        // POST /inscribirme/{course_id}
        // Always answers with a 303 redirect carrying a notice in `?msg=`.
        .route("/inscribirme/{course_id}", post(handlers::enrollments::enroll))
        .route("/mis-cursos", get(handlers::student::my_courses))
}
