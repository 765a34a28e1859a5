use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{ChartSeries, CourseAverage, CourseCount, DailyCount, Role, StatusCount},
    policy::{Action, Actor, Resource, authorize},
};

/// Course charts are global for admins and restricted to owned courses for instructors.
fn course_scope(user: &AuthUser) -> Result<Option<i64>, AppError> {
    authorize(Actor::from(user), Resource::CourseStatistics, Action::View).require()?;
    Ok(match user.role {
        Role::Admin => None,
        _ => Some(user.id),
    })
}

fn series<T>(title: &str, x_label: &str, y_label: &str, points: Vec<T>) -> Json<ChartSeries<T>> {
    Json(ChartSeries {
        title: title.to_string(),
        x_label: x_label.to_string(),
        y_label: y_label.to_string(),
        points,
    })
}

/// enrollments_per_course
///
/// [Chart] Enrollment count per course.
#[utoipa::path(
    get,
    path = "/admin/stats/inscripciones",
    responses(
        (status = 200, description = "Chart series"),
        (status = 403, description = "Students may not view course statistics")
    )
)]
pub async fn enrollments_per_course(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ChartSeries<CourseCount>>, AppError> {
    let scope = course_scope(&user)?;
    let points = state.repo.enrollments_per_course(scope).await;
    Ok(series("Inscripciones por curso", "Curso", "Inscripciones", points))
}

/// average_grade_per_course
///
/// [Chart] Mean of the graded enrollments per course. Ungraded rows are ignored.
#[utoipa::path(
    get,
    path = "/admin/stats/notas",
    responses(
        (status = 200, description = "Chart series"),
        (status = 403, description = "Students may not view course statistics")
    )
)]
pub async fn average_grade_per_course(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ChartSeries<CourseAverage>>, AppError> {
    let scope = course_scope(&user)?;
    let points = state.repo.average_grade_per_course(scope).await;
    Ok(series("Promedio de notas por curso", "Curso", "Nota promedio", points))
}

/// enrollment_activity
///
/// [Chart] Enrollments per UTC day, oldest first.
#[utoipa::path(
    get,
    path = "/admin/stats/actividad",
    responses(
        (status = 200, description = "Chart series"),
        (status = 403, description = "Students may not view course statistics")
    )
)]
pub async fn enrollment_activity(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ChartSeries<DailyCount>>, AppError> {
    let scope = course_scope(&user)?;
    let points = state.repo.enrollment_activity(scope).await;
    Ok(series("Actividad de inscripciones", "Fecha", "Inscripciones", points))
}

/// student_grades
///
/// [Chart] The caller's grade per course.
#[utoipa::path(
    get,
    path = "/estudiante/stats/notas",
    responses(
        (status = 200, description = "Chart series"),
        (status = 403, description = "Not a student")
    )
)]
pub async fn student_grades(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ChartSeries<CourseAverage>>, AppError> {
    authorize(Actor::from(&user), Resource::StudentStatistics { student: user.id }, Action::View).require()?;
    let points = state.repo.student_average_grades(user.id).await;
    Ok(series("Mis notas", "Curso", "Nota", points))
}

/// student_status_breakdown
///
/// [Chart] How many of the caller's enrollments are in each status.
#[utoipa::path(
    get,
    path = "/estudiante/stats/estado_entregas",
    responses(
        (status = 200, description = "Chart series"),
        (status = 403, description = "Not a student")
    )
)]
pub async fn student_status_breakdown(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ChartSeries<StatusCount>>, AppError> {
    authorize(Actor::from(&user), Resource::StudentStatistics { student: user.id }, Action::View).require()?;
    let points = state.repo.student_status_counts(user.id).await;
    Ok(series("Estado de entregas", "Estado", "Cantidad", points))
}
