use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// The administrator panel. Each handler requires the admin role through the policy,
/// except the chart endpoints which instructors may also read, scoped to their courses.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(handlers::admin::get_admin_panel))
        // GET /admin/stats
        // Dashboard counters: users, courses, enrollments and pending enrollments.
        .route("/admin/stats", get(handlers::admin::get_admin_stats))
        // --- User Administration ---
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/users/{id}/role", post(handlers::admin::update_user_role))
        // POST /admin/users/{id}/delete
        // Refuses to delete the calling admin (409).
        .route("/admin/users/{id}/delete", post(handlers::admin::delete_user))
        // --- Courses ---
        .route("/admin/mis-cursos", get(handlers::admin::admin_my_courses))
        .route("/admin/todos-cursos", get(handlers::admin::admin_all_courses))
        .route(
            "/admin/curso/{id}/inscripciones",
            get(handlers::admin::admin_course_enrollments),
        )
        // --- Charts ---
        .route("/admin/stats/inscripciones", get(handlers::stats::enrollments_per_course))
        .route("/admin/stats/notas", get(handlers::stats::average_grade_per_course))
        .route("/admin/stats/actividad", get(handlers::stats::enrollment_activity))
}
