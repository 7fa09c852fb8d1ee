// src/db/queries/dashboard.rs
//
// Read views over the outpass table. No business logic lives here; the
// handlers only translate role + filters into SQL.
use axum::extract::{Extension, Query, State};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::models::outpass::OutpassStatus;
use crate::db::models::user::{Role, UserAccess};
use crate::utils::api_response::ApiResponse;
use crate::workflow::OutpassError;

/// One outpass enriched with student/parent reference data for display.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct DashboardOutpass {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub student_roll_no: String,
    pub student_class: String,
    pub student_section: String,
    pub student_hostel: Option<String>,
    pub student_room: String,
    pub parent_name: String,
    pub parent_phone: String,
    pub reason: String,
    pub destination: String,
    pub outgoing_date: NaiveDate,
    #[schema(value_type = String)]
    pub outgoing_time: NaiveTime,
    pub expected_return_date: NaiveDate,
    #[schema(value_type = String)]
    pub expected_return_time: NaiveTime,
    pub actual_return_date: Option<DateTime<Utc>>,
    pub status: OutpassStatus,
    pub is_priority: bool,
    pub priority_level: i32,
    #[schema(value_type = Option<f64>)]
    pub fee_due: Option<BigDecimal>,
    pub fee_paid: bool,
    pub fee_paid_at: Option<DateTime<Utc>>,
    pub meeting_scheduled: bool,
    pub meeting_date: Option<DateTime<Utc>>,
    pub meeting_venue: String,
    pub verification_photo: Option<String>,
    pub exit_code: String,
    pub return_code: String,
    pub checkout_time: Option<DateTime<Utc>>,
    pub gate_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardFilters {
    /// Status class: pending | approved | meeting | returned | not_returned |
    /// in_hostel | checked_out | outside
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub priority: Option<bool>,
    pub history: Option<bool>,
    /// Free-text search over student name, roll, class, section and hostel.
    pub search: Option<String>,
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub roll_no: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

const BASE_SELECT: &str = r#"
SELECT o.id, o.student_id,
       s.first_name AS student_name, s.roll_number AS student_roll_no,
       s.class_name AS student_class, s.section AS student_section,
       h.name AS student_hostel, s.room_number AS student_room,
       p.first_name AS parent_name, p.phone AS parent_phone,
       o.reason, o.destination,
       o.outgoing_date, o.outgoing_time, o.expected_return_date, o.expected_return_time,
       o.actual_return_date, o.status, o.is_priority, o.priority_level,
       o.fee_due, o.fee_paid, o.fee_paid_at,
       o.meeting_scheduled, o.meeting_date, o.meeting_venue,
       o.verification_photo, o.exit_code, o.return_code,
       o.checkout_time, o.gate_number, o.created_at, o.updated_at
FROM outpasses o
JOIN students s ON s.id = o.student_id
JOIN users p ON p.id = o.parent_id
LEFT JOIN hostels h ON h.id = s.hostel_id
WHERE 1 = 1
"#;

#[utoipa::path(
    get,
    path = "/dashboard/outpasses",
    params(DashboardFilters),
    responses(
        (status = 200, description = "Filtered outpass view for the caller's role", body = Vec<DashboardOutpass>)
    ),
    tag = "Dashboard",
    security(("bearerAuth" = []))
)]
pub async fn list_dashboard_outpasses(
    State(pool): State<PgPool>,
    Extension(access): Extension<UserAccess>,
    Query(filters): Query<DashboardFilters>,
) -> Result<ApiResponse<Vec<DashboardOutpass>>, ApiResponse<()>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(BASE_SELECT);

    // Warden listings are always scoped to the warden's hostel.
    if access.role == Role::Warden {
        if let Some(hostel_id) = access.assigned_hostel {
            qb.push(" AND s.hostel_id = ").push_bind(hostel_id);
        }
    }
    // Parents never see other families' requests.
    if access.role == Role::Parent {
        qb.push(" AND o.parent_id = ").push_bind(access.user_id);
    }

    if let Some(search) = filters.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (s.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.last_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.roll_number ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.class_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR s.section ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR h.name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(class_name) = filters.class_name.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND s.class_name ILIKE ").push_bind(class_name.to_string());
    }
    if let Some(section) = filters.section.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND s.section ILIKE ").push_bind(section.to_string());
    }
    if let Some(roll_no) = filters.roll_no.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND s.roll_number ILIKE ")
            .push_bind(format!("%{roll_no}%"));
    }
    if let Some(start_date) = filters.start_date {
        qb.push(" AND o.outgoing_date >= ").push_bind(start_date);
    }
    if let Some(end_date) = filters.end_date {
        qb.push(" AND o.outgoing_date <= ").push_bind(end_date);
    }

    let status = filters
        .status
        .as_deref()
        .map(|s| s.to_ascii_lowercase());

    let order: &str;
    if filters.priority == Some(true) {
        qb.push(" AND o.is_priority = TRUE AND o.status NOT IN ('COMPLETED', 'CANCELLED', 'REJECTED')");
        order = " ORDER BY o.created_at DESC";
    } else if filters.history == Some(true) && status.is_none() {
        order = " ORDER BY o.created_at DESC";
    } else if let Some(status) = status.as_deref() {
        match status {
            "returned" => {
                qb.push(" AND o.status = 'COMPLETED'");
                if let Some(date) = filters.date {
                    qb.push(" AND o.actual_return_date::date = ").push_bind(date);
                }
                order = " ORDER BY o.actual_return_date DESC";
            }
            "not_returned" => {
                qb.push(" AND o.status IN ('CHECKED_OUT', 'OVERDUE')");
                if let Some(date) = filters.date {
                    qb.push(" AND o.expected_return_date = ").push_bind(date);
                }
                order = " ORDER BY o.expected_return_date";
            }
            "approved" => {
                qb.push(" AND o.status = 'APPROVED'");
                order = " ORDER BY o.updated_at DESC";
            }
            "meeting" => {
                qb.push(" AND o.status = 'MEETING'");
                order = " ORDER BY o.meeting_date";
            }
            "pending" => {
                qb.push(" AND o.status IN ('PENDING', 'FEE_PENDING')");
                order = " ORDER BY o.outgoing_date";
            }
            // Warden board columns.
            "in_hostel" => {
                qb.push(" AND o.status = 'APPROVED'");
                order = " ORDER BY o.outgoing_date";
            }
            "checked_out" => {
                qb.push(" AND o.status = 'READY_FOR_EXIT'");
                order = " ORDER BY o.updated_at DESC";
            }
            "outside" => {
                qb.push(" AND o.status IN ('CHECKED_OUT', 'OVERDUE')");
                order = " ORDER BY o.checkout_time DESC";
            }
            _ => {
                order = " ORDER BY o.created_at DESC";
            }
        }
    } else {
        // Role default views.
        match access.role {
            Role::Accountant | Role::Hm => {
                qb.push(" AND o.status IN ('PENDING', 'FEE_PENDING')");
                order = " ORDER BY o.outgoing_date";
            }
            Role::Warden => {
                qb.push(" AND o.status IN ('APPROVED', 'READY_FOR_EXIT') AND o.outgoing_date = CURRENT_DATE");
                order = " ORDER BY o.outgoing_date";
            }
            Role::GateStaff => {
                qb.push(" AND o.status IN ('READY_FOR_EXIT', 'CHECKED_OUT')");
                order = " ORDER BY o.updated_at DESC";
            }
            Role::Parent | Role::Admin => {
                order = " ORDER BY o.created_at DESC";
            }
        }
    }

    qb.push(order);

    let rows = qb
        .build_query_as::<DashboardOutpass>()
        .fetch_all(&pool)
        .await
        .map_err(OutpassError::Database)?;

    Ok(ApiResponse::ok("Dashboard outpasses", rows))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
struct StatusCounts {
    total: i64,
    pending: i64,
    approved: i64,
    active: i64,
    overdue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendPoint {
    /// Day formatted as MM-DD.
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OutpassStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub active: i64,
    pub overdue: i64,
    /// Trailing seven days, oldest first.
    pub trends: Vec<TrendPoint>,
}

#[utoipa::path(
    get,
    path = "/dashboard/stats",
    responses(
        (status = 200, description = "Outpass counters and trailing trend", body = OutpassStats)
    ),
    tag = "Dashboard",
    security(("bearerAuth" = []))
)]
pub async fn get_stats(
    State(pool): State<PgPool>,
    Extension(_access): Extension<UserAccess>,
) -> Result<ApiResponse<OutpassStats>, ApiResponse<()>> {
    let counts = sqlx::query_as::<_, StatusCounts>(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE status = 'PENDING') AS pending,
               COUNT(*) FILTER (WHERE status = 'APPROVED') AS approved,
               COUNT(*) FILTER (WHERE status = 'CHECKED_OUT') AS active,
               COUNT(*) FILTER (WHERE status = 'OVERDUE') AS overdue
        FROM outpasses
        "#,
    )
    .fetch_one(&pool)
    .await
    .map_err(OutpassError::Database)?;

    let today = Utc::now().date_naive();
    let window_start = today - Duration::days(6);
    let per_day: Vec<(NaiveDate, i64)> = sqlx::query_as(
        r#"
        SELECT outgoing_date, COUNT(*) FROM outpasses
        WHERE outgoing_date >= $1 AND outgoing_date <= $2
        GROUP BY outgoing_date
        "#,
    )
    .bind(window_start)
    .bind(today)
    .fetch_all(&pool)
    .await
    .map_err(OutpassError::Database)?;

    let trends = (0..7)
        .map(|offset| {
            let day = window_start + Duration::days(offset);
            let count = per_day
                .iter()
                .find(|(d, _)| *d == day)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            TrendPoint {
                date: day.format("%m-%d").to_string(),
                count,
            }
        })
        .collect();

    Ok(ApiResponse::ok(
        "Outpass stats",
        OutpassStats {
            total: counts.total,
            pending: counts.pending,
            approved: counts.approved,
            active: counts.active,
            overdue: counts.overdue,
            trends,
        },
    ))
}
