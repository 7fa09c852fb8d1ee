// src/db/models/student.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Read-only student record from the reference directory.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub roll_number: String,
    pub class_name: String,
    pub section: String,
    pub hostel_id: Option<Uuid>,
    pub room_number: String,
    pub created_at: DateTime<Utc>,
}

/// Registered pickup guardian for a student.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Guardian {
    pub id: Uuid,
    pub student_id: Uuid,
    pub name: String,
    pub phone: String,
    pub relation: String,
}
