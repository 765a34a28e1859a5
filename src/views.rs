//! Role-based landing pages and notice redirects.

use axum::response::Redirect;

use crate::models::Role;

/// Landing panel of each role.
pub fn panel_path(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin",
        Role::Instructor => "/profesor",
        Role::Student => "/estudiante",
    }
}

pub fn redirect_by_role(role: Role) -> Redirect {
    Redirect::to(panel_path(role))
}

/// Short-lived message passed to the next page through the `msg` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Enrolled,
    AlreadyEnrolled,
    CourseNotFound,
}

impl Notice {
    pub fn as_str(self) -> &'static str {
        match self {
            Notice::Enrolled => "enrolled",
            Notice::AlreadyEnrolled => "already_enrolled",
            Notice::CourseNotFound => "course_not_found",
        }
    }
}

/// `303 See Other` to `path?msg=<notice>`.
pub fn redirect_with_notice(path: &str, notice: Notice) -> Redirect {
    Redirect::to(&format!("{path}?msg={}", notice.as_str()))
}
