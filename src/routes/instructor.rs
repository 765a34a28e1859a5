use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Instructor Router Module
///
/// Panel, course listings, gradebook and the roster of owned courses. Rosters of courses
/// owned by someone else are refused with 403.
pub fn instructor_routes() -> Router<AppState> {
    Router::new()
        .route("/profesor", get(handlers::instructor::get_instructor_panel))
        .route("/profesor/mis-cursos", get(handlers::instructor::instructor_my_courses))
        .route("/profesor/todos-cursos", get(handlers::instructor::instructor_all_courses))
        .route("/profesor/calificaciones", get(handlers::instructor::gradebook))
        // GET/POST /profesor/curso/{id}/inscripciones
        // POST takes `{enrollment_id, status?, grade?}` and applies only the valid fields.
        .route(
            "/profesor/curso/{id}/inscripciones",
            get(handlers::instructor::course_enrollments).post(handlers::instructor::update_enrollment),
        )
}
