use crate::{AppState, handlers};
use axum::{Router, routing::get};

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/estudiante", get(handlers::student::get_student_panel))
        .route("/estudiante/cursos", get(handlers::student::student_all_courses))
        .route("/estudiante/stats/notas", get(handlers::stats::student_grades))
        .route(
            "/estudiante/stats/estado_entregas",
            get(handlers::stats::student_status_breakdown),
        )
}
