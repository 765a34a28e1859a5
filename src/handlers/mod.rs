//! HTTP handlers, grouped by the area of the portal they serve.
//!
//! Handlers stay thin: they extract the request, call into the workflow modules
//! (`accounts`, `catalog`, `enrollment`, `seed`) and shape the response.

pub mod admin;
pub mod auth;
pub mod courses;
pub mod enrollments;
pub mod instructor;
pub mod stats;
pub mod student;

use serde::Deserialize;

/// NoticeQuery
///
/// The `?msg=` parameter left by a notice redirect.
#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
pub struct NoticeQuery {
    pub msg: Option<String>,
}
