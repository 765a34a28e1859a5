use crate::models::{
    Course, CourseAverage, CourseChanges, CourseCount, DailyCount, DashboardStats, Enrollment,
    EnrollmentPatch, EnrollmentWithStudent, GradeChange, GradebookRow,
    NewCourse, NewEnrollment, NewUser, Role, StatusCount, StudentEnrollment, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;

/// RepositoryError
///
/// Write-path failures. `Conflict` is a unique-constraint violation (duplicate username,
/// duplicate course name for the same owner); everything else is a database fault.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record conflicts with an existing one")]
    Conflict,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Maps unique violations to `Conflict`, keeping other errors as-is.
    fn from_write(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
            _ => RepositoryError::Database(err),
        }
    }
}

/// Repository Trait
///
/// The abstract contract for the identity, catalog and enrollment stores. Handlers and
/// workflows only see `Arc<dyn Repository>`, so tests can swap in an in-memory double.
///
/// Read methods log database errors and degrade to `None`/empty. Write methods return
/// `Result` so callers can tell a conflict from a fault.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity store ---
    async fn get_user(&self, id: i64) -> Option<User>;
    async fn find_user_by_username(&self, username: &str) -> Option<User>;
    // Conflict if the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn list_users(&self) -> Vec<User>;
    async fn update_user_role(&self, id: i64, role: Role) -> Result<Option<User>, RepositoryError>;
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, RepositoryError>;
    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError>;
    async fn count_users(&self) -> i64;

    // --- Catalog store ---
    async fn list_courses(&self) -> Vec<Course>;
    async fn list_courses_by_instructor(&self, instructor_id: i64) -> Vec<Course>;
    async fn get_course(&self, id: i64) -> Option<Course>;
    // Owner match uses `IS NOT DISTINCT FROM`, so `None` finds admin-created courses.
    async fn find_course_by_owner_and_name(&self, instructor_id: Option<i64>, name: &str) -> Option<Course>;
    // Conflict if the owner already has a course with this name.
    async fn create_course(&self, course: NewCourse) -> Result<Course, RepositoryError>;
    async fn update_course(&self, id: i64, changes: CourseChanges) -> Result<Option<Course>, RepositoryError>;
    async fn assign_instructor(&self, id: i64, instructor_id: i64) -> Result<bool, RepositoryError>;
    async fn delete_course(&self, id: i64) -> Result<bool, RepositoryError>;
    async fn count_courses(&self) -> i64;

    // --- Enrollment store ---
    // Atomic insert-if-absent: `Ok(None)` when the (user, course) pair already exists.
    async fn create_enrollment(&self, enrollment: NewEnrollment) -> Result<Option<Enrollment>, RepositoryError>;
    async fn get_enrollment(&self, id: i64) -> Option<Enrollment>;
    // Applies the patch only if the enrollment belongs to `course_id`.
    async fn update_enrollment(
        &self,
        id: i64,
        course_id: i64,
        patch: EnrollmentPatch,
    ) -> Result<Option<Enrollment>, RepositoryError>;
    async fn list_enrollments_for_course(&self, course_id: i64) -> Vec<EnrollmentWithStudent>;
    async fn list_enrollments_for_student(&self, user_id: i64) -> Vec<StudentEnrollment>;
    // `instructor_id = None` means every course.
    async fn list_gradebook(&self, instructor_id: Option<i64>) -> Vec<GradebookRow>;
    async fn count_enrollments(&self) -> i64;

    // --- Statistics ---
    async fn get_dashboard_stats(&self) -> DashboardStats;
    async fn enrollments_per_course(&self, instructor_id: Option<i64>) -> Vec<CourseCount>;
    async fn average_grade_per_course(&self, instructor_id: Option<i64>) -> Vec<CourseAverage>;
    async fn enrollment_activity(&self, instructor_id: Option<i64>) -> Vec<DailyCount>;
    async fn student_average_grades(&self, user_id: i64) -> Vec<CourseAverage>;
    async fn student_status_counts(&self, user_id: i64) -> Vec<StatusCount>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Queries are checked at runtime
/// (`query_as::<_, T>`), so building the crate does not need a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at";
const COURSE_COLUMNS: &str = "id, name, description, price, instructor_id, image_key, created_at";
const ENROLLMENT_COLUMNS: &str = "id, user_id, course_id, status, grade, created_at";

/// Appends `WHERE`/`AND c.instructor_id = $n` when the statistics are scoped to one instructor.
fn push_instructor_scope(builder: &mut QueryBuilder<'_, sqlx::Postgres>, instructor_id: Option<i64>, has_where: bool) {
    if let Some(id) = instructor_id {
        builder.push(if has_where { " AND " } else { " WHERE " });
        builder.push("c.instructor_id = ");
        builder.push_bind(id);
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- IDENTITY ---

    async fn get_user(&self, id: i64) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn find_user_by_username(&self, username: &str) -> Option<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("find_user_by_username error: {:?}", e);
                None
            })
    }

    /// create_user
    ///
    /// Relies on the `UNIQUE (username)` constraint; a violation surfaces as `Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    async fn list_users(&self) -> Vec<User> {
        match sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))
            .fetch_all(&self.pool)
            .await
        {
            Ok(users) => users,
            Err(e) => {
                tracing::error!("list_users error: {:?}", e);
                vec![]
            }
        }
    }

    async fn update_user_role(&self, id: i64, role: Role) -> Result<Option<User>, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $1 WHERE id = $2 RETURNING {USER_COLUMNS}"
        ))
        .bind(role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// delete_user
    ///
    /// Enrollments cascade; owned courses keep existing with `instructor_id = NULL`.
    /// An owned course whose name is already taken by an unowned course is first renamed
    /// to `"<name> (<username>)"` so it fits the shared unowned namespace.
    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let username = sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(username) = username else {
            return Ok(false);
        };

        let renamed = sqlx::query(
            "UPDATE courses c SET name = c.name || ' (' || $2 || ')' \
             WHERE c.instructor_id = $1 \
             AND EXISTS (SELECT 1 FROM courses o WHERE o.instructor_id IS NULL AND o.name = c.name)",
        )
        .bind(id)
        .bind(&username)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from_write)?;

        if renamed.rows_affected() > 0 {
            tracing::info!(user_id = id, count = renamed.rows_affected(), "renamed orphaned courses");
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from_write)?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0)
    }

    // --- CATALOG ---

    async fn list_courses(&self) -> Vec<Course> {
        match sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses ORDER BY name"))
            .fetch_all(&self.pool)
            .await
        {
            Ok(courses) => courses,
            Err(e) => {
                tracing::error!("list_courses error: {:?}", e);
                vec![]
            }
        }
    }

    async fn list_courses_by_instructor(&self, instructor_id: i64) -> Vec<Course> {
        match sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE instructor_id = $1 ORDER BY name"
        ))
        .bind(instructor_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(courses) => courses,
            Err(e) => {
                tracing::error!("list_courses_by_instructor error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_course(&self, id: i64) -> Option<Course> {
        sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_course error: {:?}", e);
                None
            })
    }

    async fn find_course_by_owner_and_name(&self, instructor_id: Option<i64>, name: &str) -> Option<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE name = $1 AND instructor_id IS NOT DISTINCT FROM $2"
        ))
        .bind(name)
        .bind(instructor_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("find_course_by_owner_and_name error: {:?}", e);
            None
        })
    }

    /// create_course
    ///
    /// Per-owner name uniqueness is enforced by `courses_owner_name_key`, so two concurrent
    /// creations with the same name cannot both succeed.
    async fn create_course(&self, course: NewCourse) -> Result<Course, RepositoryError> {
        sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (name, description, price, instructor_id, image_key) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COURSE_COLUMNS}"
        ))
        .bind(&course.name)
        .bind(&course.description)
        .bind(course.price)
        .bind(course.instructor_id)
        .bind(&course.image_key)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    /// update_course
    ///
    /// Uses `COALESCE` so the image key is only replaced when a new upload succeeded.
    async fn update_course(&self, id: i64, changes: CourseChanges) -> Result<Option<Course>, RepositoryError> {
        sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses SET name = $2, description = $3, price = $4, \
             image_key = COALESCE($5, image_key) WHERE id = $1 RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(&changes.image_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    async fn assign_instructor(&self, id: i64, instructor_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE courses SET instructor_id = $1 WHERE id = $2")
            .bind(instructor_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from_write)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_course(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_courses(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0)
    }

    // --- ENROLLMENTS ---

    /// create_enrollment
    ///
    /// `ON CONFLICT DO NOTHING` against `UNIQUE (user_id, course_id)` makes the insert
    /// idempotent: a second attempt returns no row instead of racing a prior existence check.
    async fn create_enrollment(&self, enrollment: NewEnrollment) -> Result<Option<Enrollment>, RepositoryError> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "INSERT INTO enrollments (user_id, course_id, status, grade, created_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (user_id, course_id) DO NOTHING \
             RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(enrollment.user_id)
        .bind(enrollment.course_id)
        .bind(enrollment.status)
        .bind(enrollment.grade)
        .bind(enrollment.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    async fn get_enrollment(&self, id: i64) -> Option<Enrollment> {
        sqlx::query_as::<_, Enrollment>(&format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_enrollment error: {:?}", e);
                None
            })
    }

    /// update_enrollment
    ///
    /// Partial update: `COALESCE` keeps the status when none is given, and the grade is
    /// only written when `$3` says so (either cleared to NULL or set to `$4`).
    async fn update_enrollment(
        &self,
        id: i64,
        course_id: i64,
        patch: EnrollmentPatch,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let (write_grade, grade) = match patch.grade {
            GradeChange::Keep => (false, None),
            GradeChange::Clear => (true, None),
            GradeChange::Set(value) => (true, Some(value)),
        };

        sqlx::query_as::<_, Enrollment>(&format!(
            "UPDATE enrollments \
             SET status = COALESCE($2, status), \
                 grade = CASE WHEN $3 THEN $4 ELSE grade END \
             WHERE id = $1 AND course_id = $5 \
             RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.status)
        .bind(write_grade)
        .bind(grade)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from_write)
    }

    async fn list_enrollments_for_course(&self, course_id: i64) -> Vec<EnrollmentWithStudent> {
        sqlx::query_as::<_, EnrollmentWithStudent>(
            r#"
            SELECT e.id, e.user_id, u.username, e.course_id, e.status, e.grade, e.created_at
            FROM enrollments e
            JOIN users u ON u.id = e.user_id
            WHERE e.course_id = $1
            ORDER BY u.username
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_enrollments_for_course error: {:?}", e);
            vec![]
        })
    }

    async fn list_enrollments_for_student(&self, user_id: i64) -> Vec<StudentEnrollment> {
        sqlx::query_as::<_, StudentEnrollment>(
            r#"
            SELECT e.id AS enrollment_id, c.id AS course_id, c.name AS course_name,
                   c.description, c.price, e.status, e.grade, e.created_at AS enrolled_at
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1
            ORDER BY e.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("list_enrollments_for_student error: {:?}", e);
            vec![]
        })
    }

    async fn list_gradebook(&self, instructor_id: Option<i64>) -> Vec<GradebookRow> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            r#"
            SELECT e.id AS enrollment_id, c.id AS course_id, c.name AS course_name,
                   u.id AS user_id, u.username, e.status, e.grade
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            JOIN users u ON u.id = e.user_id
            "#,
        );
        push_instructor_scope(&mut builder, instructor_id, false);
        builder.push(" ORDER BY c.name ASC, u.username ASC");

        builder
            .build_query_as::<GradebookRow>()
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("list_gradebook error: {:?}", e);
                vec![]
            })
    }

    async fn count_enrollments(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0)
    }

    // --- STATISTICS ---

    /// get_dashboard_stats
    ///
    /// Compiles the administrator panel counters in a single round-trip.
    async fn get_dashboard_stats(&self) -> DashboardStats {
        let row = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM courses),
                (SELECT COUNT(*) FROM enrollments),
                (SELECT COUNT(*) FROM enrollments WHERE status = 'pending')
            "#,
        )
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok((total_users, total_courses, total_enrollments, pending_enrollments)) => DashboardStats {
                total_users,
                total_courses,
                total_enrollments,
                pending_enrollments,
            },
            Err(e) => {
                tracing::error!("get_dashboard_stats error: {:?}", e);
                DashboardStats::default()
            }
        }
    }

    async fn enrollments_per_course(&self, instructor_id: Option<i64>) -> Vec<CourseCount> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT c.name AS course, COUNT(e.id) AS count FROM enrollments e JOIN courses c ON c.id = e.course_id",
        );
        push_instructor_scope(&mut builder, instructor_id, false);
        builder.push(" GROUP BY c.name ORDER BY c.name");

        builder
            .build_query_as::<CourseCount>()
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("enrollments_per_course error: {:?}", e);
                vec![]
            })
    }

    async fn average_grade_per_course(&self, instructor_id: Option<i64>) -> Vec<CourseAverage> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT c.name AS course, AVG(e.grade) AS average FROM enrollments e \
             JOIN courses c ON c.id = e.course_id WHERE e.grade IS NOT NULL",
        );
        push_instructor_scope(&mut builder, instructor_id, true);
        builder.push(" GROUP BY c.name ORDER BY c.name");

        builder
            .build_query_as::<CourseAverage>()
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("average_grade_per_course error: {:?}", e);
                vec![]
            })
    }

    async fn enrollment_activity(&self, instructor_id: Option<i64>) -> Vec<DailyCount> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT (e.created_at AT TIME ZONE 'UTC')::date AS day, COUNT(e.id) AS count \
             FROM enrollments e JOIN courses c ON c.id = e.course_id",
        );
        push_instructor_scope(&mut builder, instructor_id, false);
        builder.push(" GROUP BY day ORDER BY day");

        builder
            .build_query_as::<DailyCount>()
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("enrollment_activity error: {:?}", e);
                vec![]
            })
    }

    async fn student_average_grades(&self, user_id: i64) -> Vec<CourseAverage> {
        sqlx::query_as::<_, CourseAverage>(
            r#"
            SELECT c.name AS course, AVG(e.grade) AS average
            FROM enrollments e
            JOIN courses c ON c.id = e.course_id
            WHERE e.user_id = $1 AND e.grade IS NOT NULL
            GROUP BY c.name
            ORDER BY c.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("student_average_grades error: {:?}", e);
            vec![]
        })
    }

    async fn student_status_counts(&self, user_id: i64) -> Vec<StatusCount> {
        sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM enrollments
            WHERE user_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("student_status_counts error: {:?}", e);
            vec![]
        })
    }
}
