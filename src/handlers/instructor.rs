use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    auth::AuthUser,
    catalog, enrollment,
    error::AppError,
    models::{
        CourseRoster, CourseView, EnrollmentUpdateRequest, EnrollmentUpdateResponse, GradebookRow, InstructorPanel,
        Role,
    },
    policy::{Action, Actor, Resource, authorize},
};

fn require_instructor_panel(user: &AuthUser) -> Result<(), AppError> {
    authorize(Actor::from(user), Resource::Panel(Role::Instructor), Action::View).require()
}

/// get_instructor_panel
///
/// [Instructor Route] Landing panel with the instructor's own courses.
#[utoipa::path(
    get,
    path = "/profesor",
    responses(
        (status = 200, description = "Panel", body = InstructorPanel),
        (status = 403, description = "Not an instructor")
    )
)]
pub async fn get_instructor_panel(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<InstructorPanel>, AppError> {
    require_instructor_panel(&user)?;
    let courses = state.repo.list_courses_by_instructor(user.id).await;
    Ok(Json(InstructorPanel {
        user: user.into(),
        courses,
    }))
}

/// instructor_my_courses
///
/// [Instructor Route] Courses owned by the caller.
#[utoipa::path(
    get,
    path = "/profesor/mis-cursos",
    responses((status = 200, description = "Owned courses", body = [CourseView]))
)]
pub async fn instructor_my_courses(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseView>>, AppError> {
    require_instructor_panel(&user)?;
    Ok(Json(catalog::list_owned(state.repo.as_ref(), state.storage.as_ref(), user.id).await))
}

/// instructor_all_courses
///
/// [Instructor Route] The whole catalog.
#[utoipa::path(
    get,
    path = "/profesor/todos-cursos",
    responses((status = 200, description = "Catalog", body = [CourseView]))
)]
pub async fn instructor_all_courses(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<CourseView>>, AppError> {
    require_instructor_panel(&user)?;
    Ok(Json(catalog::list_catalog(state.repo.as_ref(), state.storage.as_ref()).await))
}

/// gradebook
///
/// [Instructor Route] Enrollments of the caller's courses by course name, then username.
#[utoipa::path(
    get,
    path = "/profesor/calificaciones",
    responses(
        (status = 200, description = "Gradebook", body = [GradebookRow]),
        (status = 403, description = "Not an instructor")
    )
)]
pub async fn gradebook(user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<GradebookRow>>, AppError> {
    Ok(Json(enrollment::gradebook(state.repo.as_ref(), &user).await?))
}

/// course_enrollments
///
/// [Instructor Route] Roster of an owned course.
#[utoipa::path(
    get,
    path = "/profesor/curso/{id}/inscripciones",
    params(("id" = i64, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Roster", body = CourseRoster),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn course_enrollments(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CourseRoster>, AppError> {
    Ok(Json(enrollment::list_for_course(state.repo.as_ref(), &user, id).await?))
}

/// update_enrollment
///
/// [Instructor Route] Partial status/grade update. An unknown status is ignored and a
/// rejected grade is reported in `warnings`; the remaining changes still apply.
#[utoipa::path(
    post,
    path = "/profesor/curso/{id}/inscripciones",
    params(("id" = i64, Path, description = "Course ID")),
    request_body = EnrollmentUpdateRequest,
    responses(
        (status = 200, description = "Updated", body = EnrollmentUpdateResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Course or enrollment not found")
    )
)]
pub async fn update_enrollment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<EnrollmentUpdateRequest>,
) -> Result<Json<EnrollmentUpdateResponse>, AppError> {
    Ok(Json(
        enrollment::update_grade_or_status(state.repo.as_ref(), &user, id, &payload).await?,
    ))
}
