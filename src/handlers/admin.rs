use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState, accounts,
    auth::AuthUser,
    catalog, enrollment,
    error::AppError,
    models::{AdminPanel, ChangeRoleRequest, CourseRoster, CourseView, DashboardStats, Role, UserProfile},
    policy::{Action, Actor, Resource, authorize},
};

fn require_admin_panel(user: &AuthUser) -> Result<(), AppError> {
    authorize(Actor::from(user), Resource::Panel(Role::Admin), Action::View).require()
}

/// get_admin_panel
///
/// [Admin Route] Landing panel with the dashboard counters.
#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Panel", body = AdminPanel),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn get_admin_panel(user: AuthUser, State(state): State<AppState>) -> Result<Json<AdminPanel>, AppError> {
    require_admin_panel(&user)?;
    let stats = state.repo.get_dashboard_stats().await;
    Ok(Json(AdminPanel {
        user: user.into(),
        stats,
    }))
}

/// get_admin_stats
///
/// [Admin Route] Users, courses, enrollments and pending enrollments.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = DashboardStats),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn get_admin_stats(user: AuthUser, State(state): State<AppState>) -> Result<Json<DashboardStats>, AppError> {
    require_admin_panel(&user)?;
    Ok(Json(state.repo.get_dashboard_stats().await))
}

/// list_users
///
/// [Admin Route] Every account, ordered by username.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "Users", body = [UserProfile]),
        (status = 403, description = "Not an administrator")
    )
)]
pub async fn list_users(user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, AppError> {
    Ok(Json(accounts::list_users(state.repo.as_ref(), &user).await?))
}

/// update_user_role
///
/// [Admin Route] Changes the role of any account.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/role",
    params(("id" = i64, Path, description = "User ID")),
    request_body = ChangeRoleRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ChangeRoleRequest>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(accounts::change_role(state.repo.as_ref(), &user, id, payload.role).await?))
}

/// delete_user
///
/// [Admin Route] Deletes an account. Deleting your own account is refused with 409.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/delete",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Self-deletion refused")
    )
)]
pub async fn delete_user(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    accounts::delete_user(state.repo.as_ref(), &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// admin_my_courses
///
/// [Admin Route] Courses whose owner is the calling administrator.
#[utoipa::path(
    get,
    path = "/admin/mis-cursos",
    responses((status = 200, description = "Owned courses", body = [CourseView]))
)]
pub async fn admin_my_courses(user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<CourseView>>, AppError> {
    require_admin_panel(&user)?;
    Ok(Json(catalog::list_owned(state.repo.as_ref(), state.storage.as_ref(), user.id).await))
}

/// admin_all_courses
///
/// [Admin Route] The whole catalog.
#[utoipa::path(
    get,
    path = "/admin/todos-cursos",
    responses((status = 200, description = "Catalog", body = [CourseView]))
)]
pub async fn admin_all_courses(user: AuthUser, State(state): State<AppState>) -> Result<Json<Vec<CourseView>>, AppError> {
    require_admin_panel(&user)?;
    Ok(Json(catalog::list_catalog(state.repo.as_ref(), state.storage.as_ref()).await))
}

/// admin_course_enrollments
///
/// [Admin Route] Roster of any course.
#[utoipa::path(
    get,
    path = "/admin/curso/{id}/inscripciones",
    params(("id" = i64, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Roster", body = CourseRoster),
        (status = 404, description = "Not Found")
    )
)]
pub async fn admin_course_enrollments(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CourseRoster>, AppError> {
    require_admin_panel(&user)?;
    Ok(Json(enrollment::list_for_course(state.repo.as_ref(), &user, id).await?))
}
