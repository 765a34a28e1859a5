use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Closed Enumerations (Mapped to Postgres enum types) ---

/// Role
///
/// The RBAC role of a user, stored in the `user_role` Postgres enum.
/// Every access decision goes through `policy::authorize`, never through string comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Instructor,
    #[default]
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// EnrollmentStatus
///
/// Lifecycle tag of an enrollment. No transition order is enforced: an authorized
/// actor may set any value at any time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "enrollment_status", rename_all = "lowercase")]
#[ts(export)]
pub enum EnrollmentStatus {
    #[default]
    Pending,
    Submitted,
    Overdue,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 3] = [
        EnrollmentStatus::Pending,
        EnrollmentStatus::Submitted,
        EnrollmentStatus::Overdue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Submitted => "submitted",
            EnrollmentStatus::Overdue => "overdue",
        }
    }
}

impl FromStr for EnrollmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnrollmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. Internal only: the password hash
/// must never leave the service, so handlers respond with `UserProfile` instead.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the identity store. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

/// Course
///
/// A catalog record from the `courses` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    // Owning instructor. `None` for courses created by an administrator.
    pub instructor_id: Option<i64>,
    // S3 object key of the cover image, if an upload succeeded.
    pub image_key: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewCourse
///
/// Insert payload for the catalog store, produced by the catalog workflow after validation.
#[derive(Debug, Clone, Default)]
pub struct NewCourse {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub instructor_id: Option<i64>,
    pub image_key: Option<String>,
}

/// CourseChanges
///
/// Full replacement of the editable course fields. `image_key` is only replaced when `Some`.
#[derive(Debug, Clone, Default)]
pub struct CourseChanges {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_key: Option<String>,
}

/// Enrollment
///
/// Association record between a user and a course from the `enrollments` table.
/// The `(user_id, course_id)` pair is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewEnrollment
///
/// Insert payload for the enrollment store. Student enrollments always start as
/// `pending` with no grade; the seeder is the only caller that pre-fills the rest.
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub user_id: i64,
    pub course_id: i64,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl NewEnrollment {
    pub fn pending(user_id: i64, course_id: i64) -> Self {
        Self {
            user_id,
            course_id,
            status: EnrollmentStatus::Pending,
            grade: None,
            created_at: Utc::now(),
        }
    }
}

/// GradeChange
///
/// What to do with the grade column during a partial enrollment update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GradeChange {
    #[default]
    Keep,
    Clear,
    Set(f64),
}

/// EnrollmentPatch
///
/// Partial update applied by the grading workflow. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnrollmentPatch {
    pub status: Option<EnrollmentStatus>,
    pub grade: GradeChange,
}

impl EnrollmentPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.grade == GradeChange::Keep
    }
}

// --- Joined Read Models ---

/// EnrollmentWithStudent
///
/// Roster row: an enrollment joined with the enrolled user's name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EnrollmentWithStudent {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub course_id: i64,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// StudentEnrollment
///
/// "My courses" row: one of the student's enrollments joined with the course.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct StudentEnrollment {
    pub enrollment_id: i64,
    pub course_id: i64,
    pub course_name: String,
    pub description: String,
    pub price: f64,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
    #[ts(type = "string")]
    pub enrolled_at: DateTime<Utc>,
}

/// GradebookRow
///
/// Gradebook line across several courses, ordered by course name then username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct GradebookRow {
    pub enrollment_id: i64,
    pub course_id: i64,
    pub course_name: String,
    pub user_id: i64,
    pub username: String,
    pub status: EnrollmentStatus,
    pub grade: Option<f64>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterUserRequest
///
/// Input payload for `POST /register`. `role` defaults to `student`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// LoginRequest
///
/// Input payload for `POST /login`. When `role` is present it must match the stored role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// ChangePasswordRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// ChangeRoleRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

/// EnrollmentUpdateRequest
///
/// Form-like payload for the grading endpoint. `status` and `grade` are kept as raw
/// strings: an unknown status is ignored, an empty grade clears it, and a non-numeric
/// grade is reported as a warning instead of failing the whole update.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EnrollmentUpdateRequest {
    pub enrollment_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
}

/// ConvertPriceRequest
///
/// Input payload for `POST /cursos/{id}/convert`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ConvertPriceRequest {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

// --- Response Schemas (Output) ---

/// UserProfile
///
/// Public view of a user (never includes the password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// LoginResponse
///
/// The session token (also set as the `session` cookie) and the role's panel path.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub redirect_to: String,
    pub user: UserProfile,
}

/// CourseView
///
/// A course augmented with the public URL of its image.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CourseView {
    #[serde(flatten)]
    pub course: Course,
    pub image_url: Option<String>,
}

/// EnrollmentUpdateResponse
///
/// The enrollment after the partial update plus any validation warnings
/// (e.g. a rejected grade while the status change still applied).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct EnrollmentUpdateResponse {
    pub enrollment: Enrollment,
    pub warnings: Vec<String>,
}

/// CourseRoster
///
/// Enrollment listing for one course. `read_only` is set for viewers who may not grade.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CourseRoster {
    pub course: Course,
    pub enrollments: Vec<EnrollmentWithStudent>,
    pub read_only: bool,
}

/// ConversionResponse
///
/// Result of a price conversion. Exactly one of `converted` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ConversionResponse {
    pub course: Course,
    pub amount: f64,
    pub currency: String,
    pub converted: Option<f64>,
    pub rate: Option<f64>,
    pub provider: Option<String>,
    pub error: Option<String>,
}

// --- Dashboard & Statistics Schemas ---

/// DashboardStats
///
/// Counters shown on the administrator panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct DashboardStats {
    pub total_users: i64,
    pub total_courses: i64,
    pub total_enrollments: i64,
    pub pending_enrollments: i64,
}

/// CourseCount
///
/// One bar of the "enrollments per course" chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseCount {
    pub course: String,
    pub count: i64,
}

/// CourseAverage
///
/// One bar of the "average grade per course" chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CourseAverage {
    pub course: String,
    pub average: f64,
}

/// DailyCount
///
/// One point of the enrollment activity line chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct DailyCount {
    #[ts(type = "string")]
    pub day: NaiveDate,
    pub count: i64,
}

/// StatusCount
///
/// One bar of the student's "submission status" chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct StatusCount {
    pub status: EnrollmentStatus,
    pub count: i64,
}

/// ChartSeries
///
/// Envelope for every chart endpoint. An empty `points` list is the "no data" chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSeries<T> {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<T>,
}

// --- Panel Schemas ---

/// AdminPanel
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AdminPanel {
    pub user: UserProfile,
    pub stats: DashboardStats,
}

/// InstructorPanel
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct InstructorPanel {
    pub user: UserProfile,
    pub courses: Vec<Course>,
}

/// StudentPanel
///
/// Also the "my courses" page. `msg` echoes the notice left by a redirect.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StudentPanel {
    pub user: UserProfile,
    pub enrollments: Vec<StudentEnrollment>,
    pub msg: Option<String>,
}
