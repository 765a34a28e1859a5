//! Access-control policy.
//!
//! A single pure function decides every (actor, resource, action) triple. Handlers and
//! workflows call it instead of comparing roles inline.

use crate::{auth::AuthUser, error::AppError, models::Role};

/// Who is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User { id: i64, role: Role },
}

impl From<&AuthUser> for Actor {
    fn from(user: &AuthUser) -> Self {
        Actor::User {
            id: user.id,
            role: user.role,
        }
    }
}

/// What is being touched. Owner ids are carried so the decision needs no lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// The public course listing.
    Catalog,
    Course { owner: Option<i64> },
    /// Roster of a course: viewing it, and editing status/grade of its enrollments.
    CourseEnrollments { course_owner: Option<i64> },
    /// Enrollment records of one student.
    Enrollment { student: i64 },
    Panel(Role),
    CourseStatistics,
    StudentStatistics { student: i64 },
    UserAccount { id: i64 },
    /// User administration: listing accounts, changing roles, deleting users.
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    /// Turns a deny into `AppError::AccessDenied` (rendered as 403).
    pub fn require(self) -> Result<(), AppError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(AppError::AccessDenied),
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny }
    }
}

pub fn authorize(actor: Actor, resource: Resource, action: Action) -> Decision {
    let (id, role) = match actor {
        Actor::Anonymous => {
            return matches!(
                (resource, action),
                (Resource::Catalog | Resource::Course { .. }, Action::View)
            )
            .into();
        }
        Actor::User { id, role } => (id, role),
    };

    match role {
        Role::Admin => Decision::Allow,
        Role::Instructor => instructor(id, resource, action),
        Role::Student => student(id, resource, action),
    }
}

fn instructor(id: i64, resource: Resource, action: Action) -> Decision {
    use Action::*;

    let allowed = match (resource, action) {
        (Resource::Catalog, View) => true,
        (Resource::Course { .. }, View | Create) => true,
        (Resource::Course { owner }, Edit | Delete) => owner == Some(id),
        (Resource::CourseEnrollments { course_owner }, View | Edit) => course_owner == Some(id),
        (Resource::Panel(Role::Instructor), View) => true,
        (Resource::CourseStatistics, View) => true,
        (Resource::UserAccount { id: account }, View | Edit) => account == id,
        _ => false,
    };
    allowed.into()
}

fn student(id: i64, resource: Resource, action: Action) -> Decision {
    use Action::*;

    let allowed = match (resource, action) {
        (Resource::Catalog | Resource::Course { .. }, View) => true,
        (Resource::Enrollment { student }, Create | View) => student == id,
        (Resource::Panel(Role::Student), View) => true,
        (Resource::StudentStatistics { student }, View) => student == id,
        (Resource::UserAccount { id: account }, View | Edit) => account == id,
        _ => false,
    };
    allowed.into()
}
