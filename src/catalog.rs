//! Catalog workflow: course creation, editing and deletion with optional cover images.

use crate::{
    auth::AuthUser,
    error::AppError,
    models::{Course, CourseChanges, CourseView, NewCourse, Role},
    policy::{Action, Actor, Resource, authorize},
    repository::{Repository, RepositoryError},
    storage::{StorageService, course_image_key},
};

const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// A file received in the `image` multipart field.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// CourseForm
///
/// Raw course fields as submitted. `price` stays textual until `parse_price`.
#[derive(Debug, Clone, Default)]
pub struct CourseForm {
    pub name: String,
    pub description: String,
    pub price: Option<String>,
    pub image: Option<ImageUpload>,
}

/// parse_price
///
/// Blank or unparseable input counts as a free course (0). Negative and non-finite
/// prices are rejected.
pub fn parse_price(raw: Option<&str>) -> Result<f64, AppError> {
    let price = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<f64>().ok())
        .unwrap_or(0.0);

    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation("price must be a non-negative number".to_string()));
    }
    Ok(price)
}

fn required_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("course name is required".to_string()));
    }
    Ok(name.to_string())
}

fn duplicate_name() -> AppError {
    AppError::Duplicate("a course with this name already exists".to_string())
}

/// upload_image
///
/// Stores the image and returns its key. Missing files and storage failures yield `None`;
/// the failure is logged and never aborts the surrounding course operation.
pub async fn upload_image(storage: &dyn StorageService, image: Option<&ImageUpload>) -> Option<String> {
    let image = image.filter(|img| !img.bytes.is_empty())?;
    let key = course_image_key(image.filename.as_deref());
    let content_type = image.content_type.as_deref().unwrap_or(DEFAULT_IMAGE_TYPE);

    match storage.upload_object(&key, content_type, image.bytes.clone()).await {
        Ok(()) => {
            tracing::info!(%key, size = image.bytes.len(), "course image uploaded");
            Some(key)
        }
        Err(e) => {
            tracing::warn!(error = %e, "course image upload failed; continuing without image");
            None
        }
    }
}

pub fn course_view(storage: &dyn StorageService, course: Course) -> CourseView {
    let image_url = course.image_key.as_deref().map(|key| storage.public_url(key));
    CourseView { course, image_url }
}

pub async fn list_catalog(repo: &dyn Repository, storage: &dyn StorageService) -> Vec<CourseView> {
    repo.list_courses()
        .await
        .into_iter()
        .map(|course| course_view(storage, course))
        .collect()
}

/// Courses owned by `instructor_id`, used by the "my courses" panels.
pub async fn list_owned(repo: &dyn Repository, storage: &dyn StorageService, instructor_id: i64) -> Vec<CourseView> {
    repo.list_courses_by_instructor(instructor_id)
        .await
        .into_iter()
        .map(|course| course_view(storage, course))
        .collect()
}

pub async fn get_course(repo: &dyn Repository, storage: &dyn StorageService, id: i64) -> Result<CourseView, AppError> {
    let course = repo.get_course(id).await.ok_or_else(|| AppError::not_found("course"))?;
    Ok(course_view(storage, course))
}

/// create_course
///
/// Instructors own what they create; administrators create unowned courses.
/// Names are unique per owner.
pub async fn create_course(
    repo: &dyn Repository,
    storage: &dyn StorageService,
    actor: &AuthUser,
    form: CourseForm,
) -> Result<Course, AppError> {
    authorize(Actor::from(actor), Resource::Course { owner: None }, Action::Create).require()?;

    let name = required_name(&form.name)?;
    let price = parse_price(form.price.as_deref())?;
    let owner = match actor.role {
        Role::Instructor => Some(actor.id),
        _ => None,
    };

    if repo.find_course_by_owner_and_name(owner, &name).await.is_some() {
        return Err(duplicate_name());
    }

    let image_key = upload_image(storage, form.image.as_ref()).await;

    let course = repo
        .create_course(NewCourse {
            name,
            description: form.description.trim().to_string(),
            price,
            instructor_id: owner,
            image_key,
        })
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict => duplicate_name(),
            other => other.into(),
        })?;

    tracing::info!(course_id = course.id, owner = ?course.instructor_id, "course created");
    Ok(course)
}

/// update_course
///
/// Replaces name, description and price. The image is only replaced when a new upload
/// succeeds; a failed upload keeps the previous one.
pub async fn update_course(
    repo: &dyn Repository,
    storage: &dyn StorageService,
    actor: &AuthUser,
    id: i64,
    form: CourseForm,
) -> Result<Course, AppError> {
    let course = repo.get_course(id).await.ok_or_else(|| AppError::not_found("course"))?;
    authorize(
        Actor::from(actor),
        Resource::Course {
            owner: course.instructor_id,
        },
        Action::Edit,
    )
    .require()?;

    let name = required_name(&form.name)?;
    let price = parse_price(form.price.as_deref())?;

    if let Some(existing) = repo.find_course_by_owner_and_name(course.instructor_id, &name).await {
        if existing.id != course.id {
            return Err(duplicate_name());
        }
    }

    let image_key = upload_image(storage, form.image.as_ref()).await;

    let updated = repo
        .update_course(
            course.id,
            CourseChanges {
                name,
                description: form.description.trim().to_string(),
                price,
                image_key,
            },
        )
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict => duplicate_name(),
            other => other.into(),
        })?
        .ok_or_else(|| AppError::not_found("course"))?;

    tracing::info!(course_id = updated.id, actor_id = actor.id, "course updated");
    Ok(updated)
}

/// delete_course
///
/// Enrollments of the course are removed with it.
pub async fn delete_course(repo: &dyn Repository, actor: &AuthUser, id: i64) -> Result<(), AppError> {
    let course = repo.get_course(id).await.ok_or_else(|| AppError::not_found("course"))?;
    authorize(
        Actor::from(actor),
        Resource::Course {
            owner: course.instructor_id,
        },
        Action::Delete,
    )
    .require()?;

    if !repo.delete_course(course.id).await? {
        return Err(AppError::not_found("course"));
    }

    tracing::info!(course_id = course.id, actor_id = actor.id, "course deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_garbage_prices_are_free() {
        assert_eq!(parse_price(None).unwrap(), 0.0);
        assert_eq!(parse_price(Some("  ")).unwrap(), 0.0);
        assert_eq!(parse_price(Some("cheap")).unwrap(), 0.0);
        assert_eq!(parse_price(Some("149.99")).unwrap(), 149.99);
    }

    #[test]
    fn negative_and_infinite_prices_are_rejected() {
        assert!(parse_price(Some("-5")).is_err());
        assert!(parse_price(Some("inf")).is_err());
    }
}
