//! Demo data for local environments. Every step is idempotent.

use chrono::{Duration, Utc};

use crate::{
    error::AppError,
    models::{Course, EnrollmentStatus, NewCourse, NewEnrollment, NewUser, Role, User},
    password::hash_password,
    repository::{Repository, RepositoryError},
};

const DEMO_USERS: [(&str, &str, Role); 5] = [
    ("admin", "admin123", Role::Admin),
    ("prof", "prof123", Role::Instructor),
    ("alumno_demo", "demo123", Role::Student),
    ("alumno_ux", "ux123", Role::Student),
    ("alumno_data", "data123", Role::Student),
];

const DEMO_INSTRUCTOR: &str = "prof";

const DEMO_COURSES: [(&str, &str, f64); 9] = [
    (
        "Programación 1",
        "Curso base de programación imperativa en Python: variables, condicionales, ciclos y funciones.",
        100.0,
    ),
    (
        "Base de Datos",
        "Modelado entidad–relación, SQL básico, claves primarias/foráneas y consultas con filtros.",
        120.0,
    ),
    (
        "Desarrollo Web con HTML, CSS y Bootstrap",
        "Fundamentos del desarrollo web, maquetación responsive con Bootstrap 5, componentes y grillas.",
        150.0,
    ),
    (
        "Introducción a UX/UI y Diseño Centrado en el Usuario",
        "Heurísticas de Nielsen, investigación con usuarios, wireframes, prototipos y pruebas de usabilidad.",
        130.0,
    ),
    (
        "Java Essentials — Fundamentos del Lenguaje",
        "Sintaxis básica, clases y objetos, herencia, manejo de excepciones y ejercicios prácticos.",
        150.0,
    ),
    (
        "C# Avanzado",
        "Características avanzadas de C#, LINQ, colecciones genéricas y patrones comunes en aplicaciones desktop/web.",
        555.0,
    ),
    (
        "MariaDB / MySQL",
        "Administración básica de bases de datos relacionales, creación de esquemas, índices y consultas JOIN.",
        777.0,
    ),
    (
        "Deep Learning",
        "Introducción a redes neuronales profundas y flujo de trabajo típico en proyectos de datos.",
        777.0,
    ),
    (
        "PostgreSQL",
        "Fundamentos de PostgreSQL para aplicaciones productivas: tipos de datos, índices y buenas prácticas.",
        999.0,
    ),
];

/// (student, course index in `DEMO_COURSES`, status, grade, days ago)
const DEMO_ENROLLMENTS: [(&str, usize, EnrollmentStatus, Option<f64>, i64); 9] = [
    ("alumno_demo", 2, EnrollmentStatus::Submitted, Some(8.0), 12),
    ("alumno_demo", 3, EnrollmentStatus::Submitted, Some(10.0), 9),
    ("alumno_demo", 4, EnrollmentStatus::Submitted, Some(8.5), 5),
    ("alumno_ux", 0, EnrollmentStatus::Overdue, None, 7),
    ("alumno_ux", 5, EnrollmentStatus::Submitted, Some(9.0), 6),
    ("alumno_ux", 7, EnrollmentStatus::Pending, None, 2),
    ("alumno_data", 1, EnrollmentStatus::Submitted, Some(8.0), 10),
    ("alumno_data", 6, EnrollmentStatus::Submitted, Some(9.0), 4),
    ("alumno_data", 8, EnrollmentStatus::Pending, None, 1),
];

/// What a seeding run actually inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub courses_created: usize,
    pub enrollments_created: usize,
}

/// seed_demo
///
/// Creates each missing demo user, the demo catalog when no course exists, and the demo
/// enrollments when no enrollment exists. Running it again inserts nothing.
pub async fn seed_demo(repo: &dyn Repository) -> Result<SeedReport, AppError> {
    let mut report = SeedReport::default();

    for (username, password, role) in DEMO_USERS {
        if ensure_user(repo, username, password, role).await? {
            report.users_created += 1;
        }
    }

    let instructor_id = repo.find_user_by_username(DEMO_INSTRUCTOR).await.map(|u| u.id);

    if repo.count_courses().await == 0 {
        for (name, description, price) in DEMO_COURSES {
            create_demo_course(repo, instructor_id, name, description, price).await?;
            report.courses_created += 1;
        }
    }

    if repo.count_enrollments().await == 0 {
        report.enrollments_created = seed_enrollments(repo, instructor_id).await?;
    }

    tracing::info!(
        users = report.users_created,
        courses = report.courses_created,
        enrollments = report.enrollments_created,
        "demo seed finished"
    );
    Ok(report)
}

async fn ensure_user(repo: &dyn Repository, username: &str, password: &str, role: Role) -> Result<bool, AppError> {
    if repo.find_user_by_username(username).await.is_some() {
        return Ok(false);
    }

    let created = repo
        .create_user(NewUser {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            role,
        })
        .await;

    match created {
        Ok(_) => Ok(true),
        Err(RepositoryError::Conflict) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn create_demo_course(
    repo: &dyn Repository,
    instructor_id: Option<i64>,
    name: &str,
    description: &str,
    price: f64,
) -> Result<Course, AppError> {
    Ok(repo
        .create_course(NewCourse {
            name: name.to_string(),
            description: description.to_string(),
            price,
            instructor_id,
            image_key: None,
        })
        .await?)
}

/// Finds a demo course (owned by the instructor or unowned), creating it if missing and
/// handing unowned ones to the demo instructor so the instructor charts have data.
async fn demo_course(repo: &dyn Repository, instructor_id: Option<i64>, index: usize) -> Result<Course, AppError> {
    let (name, description, price) = DEMO_COURSES[index];

    if instructor_id.is_some() {
        if let Some(course) = repo.find_course_by_owner_and_name(instructor_id, name).await {
            return Ok(course);
        }
    }

    match (repo.find_course_by_owner_and_name(None, name).await, instructor_id) {
        (Some(course), Some(owner)) => {
            repo.assign_instructor(course.id, owner).await?;
            Ok(Course {
                instructor_id: Some(owner),
                ..course
            })
        }
        (Some(course), None) => Ok(course),
        (None, _) => create_demo_course(repo, instructor_id, name, description, price).await,
    }
}

async fn seed_enrollments(repo: &dyn Repository, instructor_id: Option<i64>) -> Result<usize, AppError> {
    let mut students: Vec<User> = Vec::new();
    let mut created = 0;
    let now = Utc::now();

    for (username, course_index, status, grade, days_ago) in DEMO_ENROLLMENTS {
        let student = match students.iter().find(|u| u.username == username) {
            Some(user) => user.clone(),
            None => {
                let Some(user) = repo.find_user_by_username(username).await else {
                    tracing::warn!(%username, "demo student missing; skipping its enrollments");
                    continue;
                };
                students.push(user.clone());
                user
            }
        };

        let course = demo_course(repo, instructor_id, course_index).await?;
        let inserted = repo
            .create_enrollment(NewEnrollment {
                user_id: student.id,
                course_id: course.id,
                status,
                grade,
                created_at: now - Duration::days(days_ago),
            })
            .await?;

        if inserted.is_some() {
            created += 1;
        }
    }

    Ok(created)
}
