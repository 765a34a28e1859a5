use axum::{
    extract::{Path, State},
    response::Redirect,
};

use crate::{
    AppState,
    auth::AuthUser,
    enrollment::{self, EnrollmentError},
    error::AppError,
    views::{Notice, redirect_with_notice},
};

/// enroll
///
/// [Authenticated Route] Enrolls the calling student and redirects with a notice.
/// Enrolling twice is not an error: the second call redirects with `already_enrolled`.
#[utoipa::path(
    post,
    path = "/inscribirme/{course_id}",
    params(("course_id" = i64, Path, description = "Course ID")),
    responses(
        (status = 303, description = "Redirect to /mis-cursos or /cursos with a msg"),
        (status = 403, description = "Instructors cannot enroll; students enroll themselves and admins may enroll")
    )
)]
pub async fn enroll(
    user: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<i64>,
) -> Result<Redirect, AppError> {
    match enrollment::enroll(state.repo.as_ref(), &user, course_id).await {
        Ok(_) => Ok(redirect_with_notice("/mis-cursos", Notice::Enrolled)),
        Err(EnrollmentError::DuplicateEnrollment) => Ok(redirect_with_notice("/mis-cursos", Notice::AlreadyEnrolled)),
        Err(EnrollmentError::CourseNotFound) => Ok(redirect_with_notice("/cursos", Notice::CourseNotFound)),
        Err(e) => Err(e.into()),
    }
}
