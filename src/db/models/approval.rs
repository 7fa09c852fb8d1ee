// src/db/models/approval.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::user::Role;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "approval_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    ReviewRequested,
}

/// Latest decision by one approver role on one outpass.
///
/// Keyed UNIQUE (outpass_id, approver_role); a later action by the same role
/// overwrites the row rather than appending.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Approval {
    pub id: Uuid,
    pub outpass_id: Uuid,
    pub approver_id: Option<i32>,
    pub approver_role: Role,
    pub status: ApprovalStatus,
    pub comments: String,
    #[schema(value_type = Option<f64>)]
    pub fee_amount: Option<BigDecimal>,
    pub meeting_date: Option<DateTime<Utc>>,
    pub approved_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
