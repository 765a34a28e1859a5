use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::AuthUser,
    catalog::{self, CourseForm, ImageUpload},
    error::AppError,
    models::{ConversionResponse, ConvertPriceRequest, CourseView},
};

const BASE_CURRENCY: &str = "USD";
const DEFAULT_TARGET_CURRENCY: &str = "ARS";

/// read_course_form
///
/// Collects the multipart fields of the course form. Unknown fields are skipped; the
/// Spanish names of the legacy form (`nombre`, `descripcion`, `precio`, `imagen`) are accepted.
async fn read_course_form(mut multipart: Multipart) -> Result<CourseForm, AppError> {
    let mut form = CourseForm::default();
    let invalid = |e: axum::extract::multipart::MultipartError| AppError::Validation(format!("invalid form data: {e}"));

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "name" | "nombre" => form.name = field.text().await.map_err(invalid)?,
            "description" | "descripcion" => form.description = field.text().await.map_err(invalid)?,
            "price" | "precio" => form.price = Some(field.text().await.map_err(invalid)?),
            "image" | "imagen" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(invalid)?;
                // Browsers send an empty part when no file was chosen.
                if filename.as_deref().is_some_and(|f| !f.is_empty()) && !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        filename,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown course form field"),
        }
    }

    Ok(form)
}

/// list_courses
///
/// [Public Route] The full catalog with resolved image URLs.
#[utoipa::path(get, path = "/cursos", responses((status = 200, description = "Catalog", body = [CourseView])))]
pub async fn list_courses(State(state): State<AppState>) -> Json<Vec<CourseView>> {
    Json(catalog::list_catalog(state.repo.as_ref(), state.storage.as_ref()).await)
}

/// get_course
///
/// [Public Route] One course by id.
#[utoipa::path(
    get,
    path = "/cursos/{id}",
    params(("id" = i64, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Found", body = CourseView),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_course(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<CourseView>, AppError> {
    Ok(Json(catalog::get_course(state.repo.as_ref(), state.storage.as_ref(), id).await?))
}

/// create_course
///
/// [Authenticated Route] Multipart form: `name`, `description`, `price`, optional `image`.
/// A failed image upload still creates the course, without an image.
#[utoipa::path(
    post,
    path = "/cursos",
    request_body(content_type = "multipart/form-data", description = "name, description, price, image"),
    responses(
        (status = 201, description = "Created", body = CourseView),
        (status = 403, description = "Students cannot create courses"),
        (status = 409, description = "Duplicate name for this owner")
    )
)]
pub async fn create_course(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CourseView>), AppError> {
    let form = read_course_form(multipart).await?;
    let course = catalog::create_course(state.repo.as_ref(), state.storage.as_ref(), &user, form).await?;
    Ok((StatusCode::CREATED, Json(catalog::course_view(state.storage.as_ref(), course))))
}

/// edit_course
///
/// [Authenticated Route] Owner or admin only.
#[utoipa::path(
    post,
    path = "/cursos/{id}/edit",
    params(("id" = i64, Path, description = "Course ID")),
    request_body(content_type = "multipart/form-data", description = "name, description, price, image"),
    responses(
        (status = 200, description = "Updated", body = CourseView),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Duplicate name for this owner")
    )
)]
pub async fn edit_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<CourseView>, AppError> {
    let form = read_course_form(multipart).await?;
    let course = catalog::update_course(state.repo.as_ref(), state.storage.as_ref(), &user, id, form).await?;
    Ok(Json(catalog::course_view(state.storage.as_ref(), course)))
}

/// delete_course
///
/// [Authenticated Route] Owner or admin only. Enrollments go with the course.
#[utoipa::path(
    post,
    path = "/cursos/{id}/delete",
    params(("id" = i64, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_course(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    catalog::delete_course(state.repo.as_ref(), &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// convert_price
///
/// [Authenticated Route] Converts an amount in USD (the course price when `amount` is
/// omitted) into `to` (default ARS). Provider failures are reported inline in `error`.
#[utoipa::path(
    post,
    path = "/cursos/{id}/convert",
    params(("id" = i64, Path, description = "Course ID")),
    request_body = ConvertPriceRequest,
    responses(
        (status = 200, description = "Conversion or inline error", body = ConversionResponse),
        (status = 404, description = "Not Found")
    )
)]
pub async fn convert_price(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ConvertPriceRequest>,
) -> Result<Json<ConversionResponse>, AppError> {
    let course = state.repo.get_course(id).await.ok_or_else(|| AppError::not_found("course"))?;

    let amount = match payload.amount.as_deref() {
        None => course.price,
        Some(raw) => raw.trim().parse::<f64>().ok().filter(|a| a.is_finite()).unwrap_or(0.0),
    };
    let currency = payload
        .to
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_TARGET_CURRENCY)
        .to_ascii_uppercase();

    let response = match state.fx.convert(amount, BASE_CURRENCY, &currency).await {
        Ok(conversion) => ConversionResponse {
            course,
            amount,
            currency,
            converted: Some(conversion.converted),
            rate: Some(conversion.rate),
            provider: Some(conversion.provider),
            error: None,
        },
        Err(e) => {
            tracing::warn!(course_id = id, %currency, error = %e, "price conversion failed");
            ConversionResponse {
                course,
                amount,
                currency,
                converted: None,
                rate: None,
                provider: None,
                error: Some(e.to_string()),
            }
        }
    };

    Ok(Json(response))
}
