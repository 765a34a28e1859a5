//! Enrollment and grading workflow.
//!
//! Every operation checks `policy::authorize` before touching the store. Enrollment
//! uniqueness is enforced by the store's atomic insert-if-absent, not by a prior lookup.

use thiserror::Error;

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{
        CourseRoster, Enrollment, EnrollmentPatch, EnrollmentStatus, EnrollmentUpdateRequest,
        EnrollmentUpdateResponse, GradeChange, GradebookRow, NewEnrollment, Role, StudentEnrollment,
    },
    policy::{Action, Actor, Resource, authorize},
    repository::{Repository, RepositoryError},
};

pub const MIN_GRADE: f64 = 0.0;
pub const MAX_GRADE: f64 = 10.0;

#[derive(Debug, Error)]
pub enum EnrollmentError {
    #[error("access denied")]
    AccessDenied,

    #[error("course not found")]
    CourseNotFound,

    #[error("enrollment not found")]
    EnrollmentNotFound,

    #[error("enrollment does not belong to this course")]
    MismatchedCourse,

    #[error("already enrolled in this course")]
    DuplicateEnrollment,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<EnrollmentError> for AppError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::AccessDenied => AppError::AccessDenied,
            EnrollmentError::CourseNotFound => AppError::not_found("course"),
            EnrollmentError::EnrollmentNotFound => AppError::not_found("enrollment"),
            EnrollmentError::MismatchedCourse => AppError::not_found("enrollment in this course"),
            EnrollmentError::DuplicateEnrollment => AppError::Duplicate("already enrolled in this course".to_string()),
            EnrollmentError::Repository(e) => e.into(),
        }
    }
}

fn require(actor: &AuthUser, resource: Resource, action: Action) -> Result<(), EnrollmentError> {
    if authorize(Actor::from(actor), resource, action).is_allowed() {
        Ok(())
    } else {
        Err(EnrollmentError::AccessDenied)
    }
}

/// parse_status
///
/// Maps a raw status field to the enumeration. Unknown values yield `None` and are
/// ignored by the update. The Spanish labels of the legacy forms are accepted as aliases.
pub fn parse_status(raw: Option<&str>) -> Option<EnrollmentStatus> {
    let value = raw?.trim().to_ascii_lowercase();
    match value.as_str() {
        "pendiente" => Some(EnrollmentStatus::Pending),
        "entregado" => Some(EnrollmentStatus::Submitted),
        "vencido" => Some(EnrollmentStatus::Overdue),
        other => other.parse().ok(),
    }
}

/// parse_grade
///
/// Absent keeps the grade, blank clears it, and a finite number in `[0, 10]` sets it.
/// Anything else is returned as a warning message and must leave the grade untouched.
pub fn parse_grade(raw: Option<&str>) -> Result<GradeChange, String> {
    let Some(raw) = raw else {
        return Ok(GradeChange::Keep);
    };

    let value = raw.trim();
    if value.is_empty() {
        return Ok(GradeChange::Clear);
    }

    match value.parse::<f64>() {
        Ok(grade) if grade.is_finite() && (MIN_GRADE..=MAX_GRADE).contains(&grade) => Ok(GradeChange::Set(grade)),
        Ok(_) => Err(format!("grade must be between {MIN_GRADE} and {MAX_GRADE}")),
        Err(_) => Err("grade must be numeric".to_string()),
    }
}

/// enroll
///
/// Creates a `pending`, ungraded enrollment for the acting student.
/// A second call for the same course fails with `DuplicateEnrollment` and writes nothing.
pub async fn enroll(repo: &dyn Repository, actor: &AuthUser, course_id: i64) -> Result<Enrollment, EnrollmentError> {
    require(actor, Resource::Enrollment { student: actor.id }, Action::Create)?;

    if repo.get_course(course_id).await.is_none() {
        return Err(EnrollmentError::CourseNotFound);
    }

    match repo.create_enrollment(NewEnrollment::pending(actor.id, course_id)).await? {
        Some(enrollment) => {
            tracing::info!(user_id = actor.id, course_id, enrollment_id = enrollment.id, "student enrolled");
            Ok(enrollment)
        }
        None => {
            tracing::debug!(user_id = actor.id, course_id, "duplicate enrollment ignored");
            Err(EnrollmentError::DuplicateEnrollment)
        }
    }
}

/// update_grade_or_status
///
/// Applies a partial status/grade update to one enrollment of `course_id`.
/// Checks run in order: course exists, actor may edit the course's enrollments,
/// enrollment exists, enrollment belongs to the course. Any failure leaves the record as is.
pub async fn update_grade_or_status(
    repo: &dyn Repository,
    actor: &AuthUser,
    course_id: i64,
    request: &EnrollmentUpdateRequest,
) -> Result<EnrollmentUpdateResponse, EnrollmentError> {
    let course = repo.get_course(course_id).await.ok_or(EnrollmentError::CourseNotFound)?;

    require(
        actor,
        Resource::CourseEnrollments {
            course_owner: course.instructor_id,
        },
        Action::Edit,
    )?;

    let current = repo
        .get_enrollment(request.enrollment_id)
        .await
        .ok_or(EnrollmentError::EnrollmentNotFound)?;

    if current.course_id != course.id {
        return Err(EnrollmentError::MismatchedCourse);
    }

    let mut warnings = Vec::new();

    let status = parse_status(request.status.as_deref());
    let grade = match parse_grade(request.grade.as_deref()) {
        Ok(change) => change,
        Err(warning) => {
            warnings.push(warning);
            GradeChange::Keep
        }
    };

    let patch = EnrollmentPatch { status, grade };
    if patch.is_empty() {
        return Ok(EnrollmentUpdateResponse {
            enrollment: current,
            warnings,
        });
    }

    let enrollment = repo
        .update_enrollment(current.id, course.id, patch)
        .await?
        .ok_or(EnrollmentError::EnrollmentNotFound)?;

    tracing::info!(
        actor_id = actor.id,
        enrollment_id = enrollment.id,
        status = enrollment.status.as_str(),
        grade = ?enrollment.grade,
        "enrollment updated"
    );

    Ok(EnrollmentUpdateResponse { enrollment, warnings })
}

/// list_for_course
///
/// Roster of one course. `read_only` tells the viewer whether they may grade it.
pub async fn list_for_course(
    repo: &dyn Repository,
    actor: &AuthUser,
    course_id: i64,
) -> Result<CourseRoster, EnrollmentError> {
    let course = repo.get_course(course_id).await.ok_or(EnrollmentError::CourseNotFound)?;
    let resource = Resource::CourseEnrollments {
        course_owner: course.instructor_id,
    };

    require(actor, resource, Action::View)?;
    let read_only = !authorize(Actor::from(actor), resource, Action::Edit).is_allowed();

    let enrollments = repo.list_enrollments_for_course(course.id).await;
    Ok(CourseRoster {
        course,
        enrollments,
        read_only,
    })
}

/// The acting user's own enrollments ("my courses").
pub async fn list_for_student(repo: &dyn Repository, actor: &AuthUser) -> Result<Vec<StudentEnrollment>, EnrollmentError> {
    require(actor, Resource::Enrollment { student: actor.id }, Action::View)?;
    Ok(repo.list_enrollments_for_student(actor.id).await)
}

/// gradebook
///
/// Every enrollment of the instructor's own courses, or of all courses for an admin.
pub async fn gradebook(repo: &dyn Repository, actor: &AuthUser) -> Result<Vec<GradebookRow>, EnrollmentError> {
    require(
        actor,
        Resource::CourseEnrollments {
            course_owner: Some(actor.id),
        },
        Action::View,
    )?;

    let scope = match actor.role {
        Role::Admin => None,
        _ => Some(actor.id),
    };
    Ok(repo.list_gradebook(scope).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_grade_clears() {
        assert_eq!(parse_grade(Some("")), Ok(GradeChange::Clear));
        assert_eq!(parse_grade(Some("   ")), Ok(GradeChange::Clear));
    }

    #[test]
    fn absent_grade_keeps() {
        assert_eq!(parse_grade(None), Ok(GradeChange::Keep));
    }

    #[test]
    fn grade_bounds_are_inclusive() {
        assert_eq!(parse_grade(Some("0")), Ok(GradeChange::Set(0.0)));
        assert_eq!(parse_grade(Some("10")), Ok(GradeChange::Set(10.0)));
        assert_eq!(parse_grade(Some(" 7.5 ")), Ok(GradeChange::Set(7.5)));
        assert!(parse_grade(Some("10.01")).is_err());
        assert!(parse_grade(Some("-1")).is_err());
    }

    #[test]
    fn non_numeric_grades_warn() {
        assert!(parse_grade(Some("abc")).is_err());
        assert!(parse_grade(Some("NaN")).is_err());
        assert!(parse_grade(Some("inf")).is_err());
    }

    #[test]
    fn status_parsing_ignores_unknown_values() {
        assert_eq!(parse_status(Some("submitted")), Some(EnrollmentStatus::Submitted));
        assert_eq!(parse_status(Some("vencido")), Some(EnrollmentStatus::Overdue));
        assert_eq!(parse_status(Some("graded")), None);
        assert_eq!(parse_status(Some("")), None);
        assert_eq!(parse_status(None), None);
    }
}
