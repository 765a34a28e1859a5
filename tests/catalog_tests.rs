mod common;

use common::{auth, world};
use course_portal::{
    catalog::{self, CourseForm, ImageUpload},
    error::AppError,
    storage::MockStorageService,
};

fn form(name: &str, price: &str) -> CourseForm {
    CourseForm {
        name: name.to_string(),
        description: "Contenido del curso".to_string(),
        price: Some(price.to_string()),
        image: None,
    }
}

fn png() -> ImageUpload {
    ImageUpload {
        filename: Some("portada.PNG".to_string()),
        content_type: Some("image/png".to_string()),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

#[tokio::test]
async fn test_instructor_owns_created_course() {
    let w = world();
    let storage = MockStorageService::new();

    let course = catalog::create_course(w.repo.as_ref(), &storage, &auth(&w.prof), form("Rust", "250"))
        .await
        .unwrap();

    assert_eq!(course.instructor_id, Some(w.prof.id));
    assert_eq!(course.price, 250.0);
    assert_eq!(course.image_key, None);
}

#[tokio::test]
async fn test_admin_courses_are_unowned() {
    let w = world();
    let storage = MockStorageService::new();

    let course = catalog::create_course(w.repo.as_ref(), &storage, &auth(&w.admin), form("Redes", ""))
        .await
        .unwrap();

    assert_eq!(course.instructor_id, None);
    assert_eq!(course.price, 0.0);
}

#[tokio::test]
async fn test_students_cannot_create_courses() {
    let w = world();
    let result = catalog::create_course(
        w.repo.as_ref(),
        &MockStorageService::new(),
        &auth(&w.alice),
        form("Rust", "1"),
    )
    .await;
    assert!(matches!(result, Err(AppError::AccessDenied)));
}

#[tokio::test]
async fn test_duplicate_name_for_the_same_owner() {
    let w = world();
    let storage = MockStorageService::new();

    let mut duplicate = form("Base de Datos", "10");
    duplicate.image = Some(png());
    let result = catalog::create_course(w.repo.as_ref(), &storage, &auth(&w.prof), duplicate).await;

    assert!(matches!(result, Err(AppError::Duplicate(_))));
    // Rejected before the upload, so nothing is left behind in the bucket.
    assert!(storage.uploaded_keys().is_empty());

    // Another instructor may reuse the name.
    let other = catalog::create_course(w.repo.as_ref(), &storage, &auth(&w.other_prof), form("Base de Datos", "10")).await;
    assert!(other.is_ok());
}

#[tokio::test]
async fn test_image_is_uploaded_under_courses_prefix() {
    let w = world();
    let storage = MockStorageService::new();

    let mut with_image = form("Rust", "10");
    with_image.image = Some(png());
    let course = catalog::create_course(w.repo.as_ref(), &storage, &auth(&w.prof), with_image)
        .await
        .unwrap();

    let key = course.image_key.expect("image key");
    assert!(key.starts_with("courses/"));
    assert!(key.ends_with(".png"));
    assert_eq!(storage.uploaded_keys(), vec![key.clone()]);

    let view = catalog::get_course(w.repo.as_ref(), &storage, course.id).await.unwrap();
    assert_eq!(view.image_url, Some(format!("http://localhost:9000/mock-bucket/{key}")));
}

#[tokio::test]
async fn test_failed_upload_still_creates_course() {
    let w = world();
    let storage = MockStorageService::new_failing();

    let mut with_image = form("Rust", "10");
    with_image.image = Some(png());
    let course = catalog::create_course(w.repo.as_ref(), &storage, &auth(&w.prof), with_image)
        .await
        .unwrap();

    assert_eq!(course.image_key, None);
    assert!(w.repo.course(course.id).is_some());
}

#[tokio::test]
async fn test_negative_price_is_rejected() {
    let w = world();
    let result = catalog::create_course(
        w.repo.as_ref(),
        &MockStorageService::new(),
        &auth(&w.prof),
        form("Rust", "-5"),
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_edit_requires_ownership() {
    let w = world();
    let storage = MockStorageService::new();

    let denied =
        catalog::update_course(w.repo.as_ref(), &storage, &auth(&w.prof), w.other_course.id, form("X", "1")).await;
    assert!(matches!(denied, Err(AppError::AccessDenied)));

    let updated = catalog::update_course(
        w.repo.as_ref(),
        &storage,
        &auth(&w.prof),
        w.prof_course.id,
        form("Base de Datos II", "130"),
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "Base de Datos II");
    assert_eq!(updated.price, 130.0);

    let admin_edit = catalog::update_course(
        w.repo.as_ref(),
        &storage,
        &auth(&w.admin),
        w.other_course.id,
        form("Deep Learning", "800"),
    )
    .await
    .unwrap();
    assert_eq!(admin_edit.price, 800.0);
}

#[tokio::test]
async fn test_failed_upload_on_edit_keeps_previous_image() {
    let w = world();

    let mut with_image = form("Rust", "10");
    with_image.image = Some(png());
    let course = catalog::create_course(w.repo.as_ref(), &MockStorageService::new(), &auth(&w.prof), with_image)
        .await
        .unwrap();

    let mut edit = form("Rust", "20");
    edit.image = Some(png());
    let updated = catalog::update_course(
        w.repo.as_ref(),
        &MockStorageService::new_failing(),
        &auth(&w.prof),
        course.id,
        edit,
    )
    .await
    .unwrap();

    assert_eq!(updated.image_key, course.image_key);
    assert_eq!(updated.price, 20.0);
}

#[tokio::test]
async fn test_delete_removes_course_and_enrollments() {
    let w = world();
    let e = w.repo.insert_enrollment(
        w.alice.id,
        w.prof_course.id,
        course_portal::models::EnrollmentStatus::Pending,
        None,
    );

    let denied = catalog::delete_course(w.repo.as_ref(), &auth(&w.other_prof), w.prof_course.id).await;
    assert!(matches!(denied, Err(AppError::AccessDenied)));

    catalog::delete_course(w.repo.as_ref(), &auth(&w.prof), w.prof_course.id)
        .await
        .unwrap();
    assert!(w.repo.course(w.prof_course.id).is_none());
    assert!(w.repo.enrollment(e.id).is_none());
}
