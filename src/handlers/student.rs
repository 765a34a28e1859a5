use axum::{
    Json,
    extract::{Query, State},
};

use super::NoticeQuery;
use crate::{
    AppState,
    auth::AuthUser,
    catalog, enrollment,
    error::AppError,
    models::{CourseView, Role, StudentPanel},
    policy::{Action, Actor, Resource, authorize},
};

async fn student_panel(state: &AppState, user: AuthUser, msg: Option<String>) -> Result<StudentPanel, AppError> {
    authorize(Actor::from(&user), Resource::Panel(Role::Student), Action::View).require()?;
    let enrollments = enrollment::list_for_student(state.repo.as_ref(), &user).await?;

    Ok(StudentPanel {
        user: user.into(),
        enrollments,
        msg,
    })
}

/// get_student_panel
///
/// [Student Route] Landing panel with the student's enrollments.
#[utoipa::path(
    get,
    path = "/estudiante",
    params(NoticeQuery),
    responses(
        (status = 200, description = "Panel", body = StudentPanel),
        (status = 403, description = "Not a student")
    )
)]
pub async fn get_student_panel(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Json<StudentPanel>, AppError> {
    Ok(Json(student_panel(&state, user, query.msg).await?))
}

/// my_courses
///
/// [Student Route] "My courses": the target of enrollment redirects.
#[utoipa::path(
    get,
    path = "/mis-cursos",
    params(NoticeQuery),
    responses(
        (status = 200, description = "Enrollments", body = StudentPanel),
        (status = 403, description = "Not a student")
    )
)]
pub async fn my_courses(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NoticeQuery>,
) -> Result<Json<StudentPanel>, AppError> {
    Ok(Json(student_panel(&state, user, query.msg).await?))
}

/// student_all_courses
///
/// [Student Route] The catalog, as browsed from the student panel.
#[utoipa::path(
    get,
    path = "/estudiante/cursos",
    responses(
        (status = 200, description = "Catalog", body = [CourseView]),
        (status = 403, description = "Not a student")
    )
)]
pub async fn student_all_courses(user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<CourseView>>, AppError> {
    authorize(Actor::from(&user), Resource::Panel(Role::Student), Action::View).require()?;
    Ok(Json(catalog::list_catalog(state.repo.as_ref(), state.storage.as_ref()).await))
}
