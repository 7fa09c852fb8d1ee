// src/db/queries/student.rs
//
// Read-only lookups against the reference directory. Student, guardian and
// hostel records are seeded and managed elsewhere; the engine only resolves
// them.
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::db::models::student::{Guardian, Student};

pub async fn resolve_student<'e>(
    executor: impl PgExecutor<'e>,
    student_id: Uuid,
) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
        .bind(student_id)
        .fetch_optional(executor)
        .await
}

/// Whether the given parent is registered for the given student.
pub async fn parent_owns_student<'e>(
    executor: impl PgExecutor<'e>,
    student_id: Uuid,
    parent_id: i32,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM student_parents WHERE student_id = $1 AND parent_id = $2)",
    )
    .bind(student_id)
    .bind(parent_id)
    .fetch_one(executor)
    .await
}

pub async fn resolve_guardian<'e>(
    executor: impl PgExecutor<'e>,
    guardian_id: Uuid,
) -> Result<Option<Guardian>, sqlx::Error> {
    sqlx::query_as::<_, Guardian>("SELECT * FROM guardians WHERE id = $1")
        .bind(guardian_id)
        .fetch_optional(executor)
        .await
}
