// src/db/models/outpass.rs
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of an outpass request.
///
/// `COMPLETED`, `REJECTED`, `CANCELLED` and `EXPIRED` are terminal; a student
/// may hold at most one request outside that set at any time.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "outpass_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutpassStatus {
    Pending,
    FeePending,
    Approved,
    Rejected,
    Cancelled,
    Meeting,
    ReadyForExit,
    CheckedOut,
    Completed,
    Overdue,
    Expired,
}

impl OutpassStatus {
    /// Statuses from which no further transition is defined.
    pub const TERMINAL: [OutpassStatus; 4] = [
        OutpassStatus::Completed,
        OutpassStatus::Rejected,
        OutpassStatus::Cancelled,
        OutpassStatus::Expired,
    ];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }
}

impl fmt::Display for OutpassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutpassStatus::Pending => "PENDING",
            OutpassStatus::FeePending => "FEE_PENDING",
            OutpassStatus::Approved => "APPROVED",
            OutpassStatus::Rejected => "REJECTED",
            OutpassStatus::Cancelled => "CANCELLED",
            OutpassStatus::Meeting => "MEETING",
            OutpassStatus::ReadyForExit => "READY_FOR_EXIT",
            OutpassStatus::CheckedOut => "CHECKED_OUT",
            OutpassStatus::Completed => "COMPLETED",
            OutpassStatus::Overdue => "OVERDUE",
            OutpassStatus::Expired => "EXPIRED",
        };
        f.write_str(name)
    }
}

/// A single outpass request row.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Outpass {
    pub id: Uuid,
    pub student_id: Uuid,
    pub parent_id: i32,
    pub guardian_id: Option<Uuid>,

    pub pickup_person_name: String,
    pub pickup_person_phone: String,
    pub pickup_person_relation: String,

    pub outgoing_date: NaiveDate,
    #[schema(value_type = String, example = "09:30:00")]
    pub outgoing_time: NaiveTime,
    pub expected_return_date: NaiveDate,
    #[schema(value_type = String, example = "18:00:00")]
    pub expected_return_time: NaiveTime,
    pub actual_return_date: Option<DateTime<Utc>>,

    pub reason: String,
    pub destination: String,
    pub mode_of_travel: String,

    pub is_priority: bool,
    pub priority_reason: String,
    pub priority_level: i32,

    pub status: OutpassStatus,

    pub checkout_time: Option<DateTime<Utc>>,
    pub checked_out_by: Option<i32>,
    pub gate_number: String,
    pub verification_photo: Option<String>,

    /// Empty until the warden releases the student for exit.
    pub exit_code: String,
    /// Empty until the exit code is consumed at the gate.
    pub return_code: String,

    pub meeting_scheduled: bool,
    pub meeting_date: Option<DateTime<Utc>>,
    pub meeting_venue: String,
    pub meeting_notes: String,

    #[schema(value_type = Option<f64>)]
    pub fee_due: Option<BigDecimal>,
    pub fee_paid: bool,
    pub fee_paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parent-submitted request body for a new outpass.
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewOutpass {
    pub student_id: Uuid,
    pub guardian_id: Option<Uuid>,
    #[serde(default)]
    pub pickup_person_name: String,
    #[serde(default)]
    pub pickup_person_phone: String,
    #[serde(default)]
    pub pickup_person_relation: String,
    pub outgoing_date: NaiveDate,
    #[schema(value_type = String, example = "09:30:00")]
    pub outgoing_time: NaiveTime,
    pub expected_return_date: NaiveDate,
    #[schema(value_type = String, example = "18:00:00")]
    pub expected_return_time: NaiveTime,
    pub reason: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub mode_of_travel: String,
    #[serde(default)]
    pub is_priority: bool,
    #[serde(default)]
    pub priority_reason: String,
    #[serde(default)]
    pub priority_level: i32,
}

/// Accountant payload marking an outstanding fee.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FeePendingPayload {
    #[schema(value_type = f64)]
    pub amount: BigDecimal,
}

/// HM payload scheduling a parent meeting.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MeetingPayload {
    pub date: DateTime<Utc>,
    pub venue: String,
    #[serde(default)]
    pub reason: String,
}

/// Optional free-text reason accompanying a rejection.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectPayload {
    pub reason: Option<String>,
}

/// Warden release payload.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct VacatePayload {
    pub verification_photo: Option<String>,
}

/// Gate checkout payload.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutPayload {
    pub gate_number: Option<String>,
}

/// Code submitted at the gate; the code alone identifies the outpass.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessCodePayload {
    pub code: String,
    pub gate_number: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanDirection {
    Exit,
    Entry,
}

/// Result of consuming a verification code at the gate.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScanOutcome {
    #[serde(rename = "type")]
    pub direction: ScanDirection,
    pub student: String,
    /// Present only when an exit code was consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<String>,
}

/// Counts from the lapsed-request maintenance sweep.
#[derive(Debug, Serialize, ToSchema)]
pub struct SweepOutcome {
    pub marked_overdue: u64,
    pub marked_expired: u64,
}
