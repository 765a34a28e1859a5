/// Router Module Index
///
/// Routes are grouped by who may reach them. Everything outside `public` sits behind
/// `auth_middleware`; role and ownership checks then happen in the handlers through
/// `policy::authorize`.

/// Routes reachable without a session.
pub mod public;

/// Routes for any signed-in user (profile, course management, enrollment).
pub mod authenticated;

/// Administrator panel, user administration and the course statistics charts.
pub mod admin;

/// Instructor panel and gradebook.
pub mod instructor;

/// Student panel and personal charts.
pub mod student;
