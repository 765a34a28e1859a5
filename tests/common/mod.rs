#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use course_portal::{
    AppConfig, AppState, CurrencyConverter,
    auth::AuthUser,
    currency::RateProvider,
    models::{
        Course, CourseAverage, CourseChanges, CourseCount, DailyCount, DashboardStats, Enrollment, EnrollmentPatch,
        EnrollmentStatus, EnrollmentWithStudent, GradeChange, GradebookRow, NewCourse, NewEnrollment, NewUser,
        Role, StatusCount, StudentEnrollment, User,
    },
    oauth::OAuthState,
    password::hash_password,
    repository::{Repository, RepositoryError},
    storage::MockStorageService,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

// --- IN-MEMORY REPOSITORY ---

#[derive(Default)]
struct Store {
    next_id: i64,
    users: Vec<User>,
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username(&self, id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn course(&self, id: i64) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    fn in_scope(&self, course_id: i64, instructor_id: Option<i64>) -> bool {
        match instructor_id {
            None => true,
            Some(owner) => self.course(course_id).is_some_and(|c| c.instructor_id == Some(owner)),
        }
    }
}

/// InMemoryRepository
///
/// A `Repository` double with the same uniqueness rules and cascades as the Postgres schema.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("store lock poisoned")
    }

    pub fn insert_user(&self, username: &str, password: &str, role: Role) -> User {
        let mut store = self.lock();
        let user = User {
            id: store.next_id(),
            username: username.to_string(),
            password_hash: hash_password(password).expect("hashing failed"),
            role,
            created_at: Utc::now(),
        };
        store.users.push(user.clone());
        user
    }

    pub fn insert_course(&self, name: &str, instructor_id: Option<i64>, price: f64) -> Course {
        let mut store = self.lock();
        let course = Course {
            id: store.next_id(),
            name: name.to_string(),
            description: format!("{name} description"),
            price,
            instructor_id,
            image_key: None,
            created_at: Utc::now(),
        };
        store.courses.push(course.clone());
        course
    }

    pub fn insert_enrollment(
        &self,
        user_id: i64,
        course_id: i64,
        status: EnrollmentStatus,
        grade: Option<f64>,
    ) -> Enrollment {
        let mut store = self.lock();
        let enrollment = Enrollment {
            id: store.next_id(),
            user_id,
            course_id,
            status,
            grade,
            created_at: Utc::now(),
        };
        store.enrollments.push(enrollment.clone());
        enrollment
    }

    pub fn enrollment(&self, id: i64) -> Option<Enrollment> {
        self.lock().enrollments.iter().find(|e| e.id == id).cloned()
    }

    pub fn enrollments_of(&self, user_id: i64, course_id: i64) -> Vec<Enrollment> {
        self.lock()
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned()
            .collect()
    }

    pub fn course(&self, id: i64) -> Option<Course> {
        self.lock().course(id).cloned()
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.lock().users.iter().find(|u| u.id == id).cloned()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: i64) -> Option<User> {
        self.user(id)
    }

    async fn find_user_by_username(&self, username: &str) -> Option<User> {
        self.lock().users.iter().find(|u| u.username == username).cloned()
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut store = self.lock();
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::Conflict);
        }
        let created = User {
            id: store.next_id(),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn list_users(&self) -> Vec<User> {
        let mut users = self.lock().users.clone();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    async fn update_user_role(&self, id: i64, role: Role) -> Result<Option<User>, RepositoryError> {
        let mut store = self.lock();
        Ok(store.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, RepositoryError> {
        let mut store = self.lock();
        match store.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut store = self.lock();
        let Some(username) = store.users.iter().find(|u| u.id == id).map(|u| u.username.clone()) else {
            return Ok(false);
        };

        // Same outcome as the Postgres rename-then-SET-NULL, including the unique index.
        let mut orphaned = store.courses.clone();
        for course in orphaned.iter_mut().filter(|c| c.instructor_id == Some(id)) {
            if store.courses.iter().any(|o| o.instructor_id.is_none() && o.name == course.name) {
                course.name = format!("{} ({})", course.name, username);
            }
            course.instructor_id = None;
        }
        let mut keys: Vec<(Option<i64>, &str)> = orphaned.iter().map(|c| (c.instructor_id, c.name.as_str())).collect();
        keys.sort();
        if keys.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(RepositoryError::Conflict);
        }

        store.courses = orphaned;
        store.users.retain(|u| u.id != id);
        store.enrollments.retain(|e| e.user_id != id);
        Ok(true)
    }

    async fn count_users(&self) -> i64 {
        self.lock().users.len() as i64
    }

    async fn list_courses(&self) -> Vec<Course> {
        let mut courses = self.lock().courses.clone();
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        courses
    }

    async fn list_courses_by_instructor(&self, instructor_id: i64) -> Vec<Course> {
        let mut courses: Vec<Course> = self
            .lock()
            .courses
            .iter()
            .filter(|c| c.instructor_id == Some(instructor_id))
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        courses
    }

    async fn get_course(&self, id: i64) -> Option<Course> {
        self.course(id)
    }

    async fn find_course_by_owner_and_name(&self, instructor_id: Option<i64>, name: &str) -> Option<Course> {
        self.lock()
            .courses
            .iter()
            .find(|c| c.instructor_id == instructor_id && c.name == name)
            .cloned()
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, RepositoryError> {
        let mut store = self.lock();
        if store
            .courses
            .iter()
            .any(|c| c.instructor_id == course.instructor_id && c.name == course.name)
        {
            return Err(RepositoryError::Conflict);
        }
        let created = Course {
            id: store.next_id(),
            name: course.name,
            description: course.description,
            price: course.price,
            instructor_id: course.instructor_id,
            image_key: course.image_key,
            created_at: Utc::now(),
        };
        store.courses.push(created.clone());
        Ok(created)
    }

    async fn update_course(&self, id: i64, changes: CourseChanges) -> Result<Option<Course>, RepositoryError> {
        let mut store = self.lock();
        let Some(owner) = store.course(id).map(|c| c.instructor_id) else {
            return Ok(None);
        };
        if store
            .courses
            .iter()
            .any(|c| c.id != id && c.instructor_id == owner && c.name == changes.name)
        {
            return Err(RepositoryError::Conflict);
        }
        Ok(store.courses.iter_mut().find(|c| c.id == id).map(|course| {
            course.name = changes.name;
            course.description = changes.description;
            course.price = changes.price;
            if let Some(key) = changes.image_key {
                course.image_key = Some(key);
            }
            course.clone()
        }))
    }

    async fn assign_instructor(&self, id: i64, instructor_id: i64) -> Result<bool, RepositoryError> {
        let mut store = self.lock();
        match store.courses.iter_mut().find(|c| c.id == id) {
            Some(course) => {
                course.instructor_id = Some(instructor_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_course(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut store = self.lock();
        let before = store.courses.len();
        store.courses.retain(|c| c.id != id);
        store.enrollments.retain(|e| e.course_id != id);
        Ok(store.courses.len() != before)
    }

    async fn count_courses(&self) -> i64 {
        self.lock().courses.len() as i64
    }

    async fn create_enrollment(&self, enrollment: NewEnrollment) -> Result<Option<Enrollment>, RepositoryError> {
        let mut store = self.lock();
        if store
            .enrollments
            .iter()
            .any(|e| e.user_id == enrollment.user_id && e.course_id == enrollment.course_id)
        {
            return Ok(None);
        }
        let created = Enrollment {
            id: store.next_id(),
            user_id: enrollment.user_id,
            course_id: enrollment.course_id,
            status: enrollment.status,
            grade: enrollment.grade,
            created_at: enrollment.created_at,
        };
        store.enrollments.push(created.clone());
        Ok(Some(created))
    }

    async fn get_enrollment(&self, id: i64) -> Option<Enrollment> {
        self.enrollment(id)
    }

    async fn update_enrollment(
        &self,
        id: i64,
        course_id: i64,
        patch: EnrollmentPatch,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let mut store = self.lock();
        Ok(store
            .enrollments
            .iter_mut()
            .find(|e| e.id == id && e.course_id == course_id)
            .map(|e| {
                if let Some(status) = patch.status {
                    e.status = status;
                }
                match patch.grade {
                    GradeChange::Keep => {}
                    GradeChange::Clear => e.grade = None,
                    GradeChange::Set(value) => e.grade = Some(value),
                }
                e.clone()
            }))
    }

    async fn list_enrollments_for_course(&self, course_id: i64) -> Vec<EnrollmentWithStudent> {
        let store = self.lock();
        let mut rows: Vec<EnrollmentWithStudent> = store
            .enrollments
            .iter()
            .filter(|e| e.course_id == course_id)
            .map(|e| EnrollmentWithStudent {
                id: e.id,
                user_id: e.user_id,
                username: store.username(e.user_id),
                course_id: e.course_id,
                status: e.status,
                grade: e.grade,
                created_at: e.created_at,
            })
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        rows
    }

    async fn list_enrollments_for_student(&self, user_id: i64) -> Vec<StudentEnrollment> {
        let store = self.lock();
        let mut rows: Vec<StudentEnrollment> = store
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| {
                store.course(e.course_id).map(|c| StudentEnrollment {
                    enrollment_id: e.id,
                    course_id: c.id,
                    course_name: c.name.clone(),
                    description: c.description.clone(),
                    price: c.price,
                    status: e.status,
                    grade: e.grade,
                    enrolled_at: e.created_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        rows
    }

    async fn list_gradebook(&self, instructor_id: Option<i64>) -> Vec<GradebookRow> {
        let store = self.lock();
        let mut rows: Vec<GradebookRow> = store
            .enrollments
            .iter()
            .filter(|e| store.in_scope(e.course_id, instructor_id))
            .filter_map(|e| {
                store.course(e.course_id).map(|c| GradebookRow {
                    enrollment_id: e.id,
                    course_id: c.id,
                    course_name: c.name.clone(),
                    user_id: e.user_id,
                    username: store.username(e.user_id),
                    status: e.status,
                    grade: e.grade,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            a.course_name
                .cmp(&b.course_name)
                .then_with(|| a.username.cmp(&b.username))
        });
        rows
    }

    async fn count_enrollments(&self) -> i64 {
        self.lock().enrollments.len() as i64
    }

    async fn get_dashboard_stats(&self) -> DashboardStats {
        let store = self.lock();
        DashboardStats {
            total_users: store.users.len() as i64,
            total_courses: store.courses.len() as i64,
            total_enrollments: store.enrollments.len() as i64,
            pending_enrollments: store
                .enrollments
                .iter()
                .filter(|e| e.status == EnrollmentStatus::Pending)
                .count() as i64,
        }
    }

    async fn enrollments_per_course(&self, instructor_id: Option<i64>) -> Vec<CourseCount> {
        let store = self.lock();
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for e in store.enrollments.iter().filter(|e| store.in_scope(e.course_id, instructor_id)) {
            if let Some(course) = store.course(e.course_id) {
                *counts.entry(course.name.clone()).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .map(|(course, count)| CourseCount { course, count })
            .collect()
    }

    async fn average_grade_per_course(&self, instructor_id: Option<i64>) -> Vec<CourseAverage> {
        let store = self.lock();
        let grades = store
            .enrollments
            .iter()
            .filter(|e| store.in_scope(e.course_id, instructor_id))
            .filter_map(|e| Some((store.course(e.course_id)?.name.clone(), e.grade?)));
        averages(grades)
    }

    async fn enrollment_activity(&self, instructor_id: Option<i64>) -> Vec<DailyCount> {
        let store = self.lock();
        let mut counts = BTreeMap::new();
        for e in store.enrollments.iter().filter(|e| store.in_scope(e.course_id, instructor_id)) {
            *counts.entry(e.created_at.date_naive()).or_insert(0_i64) += 1;
        }
        counts.into_iter().map(|(day, count)| DailyCount { day, count }).collect()
    }

    async fn student_average_grades(&self, user_id: i64) -> Vec<CourseAverage> {
        let store = self.lock();
        let grades = store
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter_map(|e| Some((store.course(e.course_id)?.name.clone(), e.grade?)));
        averages(grades)
    }

    async fn student_status_counts(&self, user_id: i64) -> Vec<StatusCount> {
        let store = self.lock();
        EnrollmentStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: store
                    .enrollments
                    .iter()
                    .filter(|e| e.user_id == user_id && e.status == status)
                    .count() as i64,
            })
            .filter(|row| row.count > 0)
            .collect()
    }
}

fn averages(grades: impl Iterator<Item = (String, f64)>) -> Vec<CourseAverage> {
    let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for (course, grade) in grades {
        let entry = sums.entry(course).or_default();
        entry.0 += grade;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(course, (sum, n))| CourseAverage {
            course,
            average: sum / f64::from(n),
        })
        .collect()
}

// --- FX DOUBLES ---

/// Answers with a fixed rate.
pub struct FixedRate(pub f64);

#[async_trait]
impl RateProvider for FixedRate {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn rate(&self, _from: &str, _to: &str) -> Result<f64, course_portal::currency::FxError> {
        Ok(self.0)
    }
}

pub fn fixed_fx(rate: f64) -> Arc<CurrencyConverter> {
    Arc::new(CurrencyConverter::new(
        vec![Arc::new(FixedRate(rate))],
        Duration::from_millis(200),
    ))
}

// --- FIXTURES ---

pub fn auth(user: &User) -> AuthUser {
    AuthUser::from(user.clone())
}

pub fn test_state(repo: Arc<InMemoryRepository>, storage: MockStorageService) -> AppState {
    test_state_with(repo, storage, fixed_fx(1000.0), None)
}

pub fn test_state_with(
    repo: Arc<InMemoryRepository>,
    storage: MockStorageService,
    fx: Arc<CurrencyConverter>,
    oauth: OAuthState,
) -> AppState {
    AppState {
        repo,
        storage: Arc::new(storage),
        fx,
        oauth,
        config: AppConfig::default(),
    }
}

/// The shared scenario: one admin, two instructors, two students and three courses.
pub struct World {
    pub repo: Arc<InMemoryRepository>,
    pub admin: User,
    pub prof: User,
    pub other_prof: User,
    pub alice: User,
    pub bob: User,
    pub prof_course: Course,
    pub other_course: Course,
    pub admin_course: Course,
}

pub fn world() -> World {
    let repo = Arc::new(InMemoryRepository::new());
    let admin = repo.insert_user("admin", "admin123", Role::Admin);
    let prof = repo.insert_user("prof", "prof123", Role::Instructor);
    let other_prof = repo.insert_user("otra_prof", "otra123", Role::Instructor);
    let alice = repo.insert_user("alice", "alice123", Role::Student);
    let bob = repo.insert_user("bob", "bob123", Role::Student);
    let prof_course = repo.insert_course("Base de Datos", Some(prof.id), 120.0);
    let other_course = repo.insert_course("Deep Learning", Some(other_prof.id), 777.0);
    let admin_course = repo.insert_course("PostgreSQL", None, 999.0);

    World {
        repo,
        admin,
        prof,
        other_prof,
        alice,
        bob,
        prof_course,
        other_course,
        admin_course,
    }
}
